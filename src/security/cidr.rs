//! CIDR range parsing and membership tests.
//!
//! Both families are handled without external crates:
//! - IPv4 via 32-bit integer masking
//! - IPv6 via whole-byte comparison plus a partial-byte mask

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use lazy_static::lazy_static;

/// A single trusted/reserved range: either a literal address or a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    network: IpAddr,
    /// `None` means literal equality (entry had no `/`).
    prefix: Option<u8>,
}

/// Reason a CIDR string was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidrParseError(pub String);

impl fmt::Display for CidrParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CidrParseError {}

impl CidrRange {
    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix(&self) -> Option<u8> {
        self.prefix
    }

    /// Membership test. Addresses of the other family never match.
    pub fn contains(&self, ip: IpAddr) -> bool {
        let Some(prefix) = self.prefix else {
            return self.network == ip;
        };

        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => v4_matches(net, addr, prefix),
            (IpAddr::V6(net), IpAddr::V6(addr)) => v6_matches(net, addr, prefix),
            _ => false,
        }
    }
}

impl FromStr for CidrRange {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, bits)) => {
                let bits: u8 = bits
                    .trim()
                    .parse()
                    .map_err(|_| CidrParseError(format!("bad prefix length in {:?}", s)))?;
                (addr.trim(), Some(bits))
            }
            None => (s, None),
        };

        let network: IpAddr = addr
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|_| CidrParseError(format!("bad address in {:?}", s)))?;

        if let Some(bits) = prefix {
            let max = if network.is_ipv4() { 32 } else { 128 };
            if bits > max {
                return Err(CidrParseError(format!(
                    "prefix /{} exceeds /{} in {:?}",
                    bits, max, s
                )));
            }
        }

        Ok(Self { network, prefix })
    }
}

fn v4_matches(net: Ipv4Addr, addr: Ipv4Addr, prefix: u8) -> bool {
    // Shifting a u32 by 32 overflows, so /0 gets its own mask.
    let mask: u32 = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    };
    (u32::from(net) & mask) == (u32::from(addr) & mask)
}

fn v6_matches(net: Ipv6Addr, addr: Ipv6Addr, prefix: u8) -> bool {
    let net = net.octets();
    let addr = addr.octets();
    let whole = usize::from(prefix / 8);
    let remainder = prefix % 8;

    if net[..whole] != addr[..whole] {
        return false;
    }
    if remainder == 0 {
        return true;
    }

    let mask = (!((1u16 << (8 - remainder)) - 1) & 0xFF) as u8;
    (net[whole] & mask) == (addr[whole] & mask)
}

/// Test whether `ip` falls inside `cidr`.
///
/// A `cidr` without `/` is compared for literal equality. Unparseable input
/// on either side never matches.
///
/// Membership is plain prefix masking: `10.0.0.0/9` spans `10.0.0.0` to
/// `10.127.255.255`, so `10.1.2.3` is inside it.
///
/// # Examples
/// ```
/// use formrelay_core::security::cidr::in_cidr;
/// assert!(in_cidr("10.1.2.3", "10.0.0.0/8"));
/// assert!(in_cidr("10.1.2.3", "10.0.0.0/9"));
/// assert!(!in_cidr("10.200.2.3", "10.0.0.0/9"));
/// ```
pub fn in_cidr(ip: &str, cidr: &str) -> bool {
    let Ok(ip) = ip.trim().parse::<IpAddr>() else {
        return false;
    };
    ip_in_cidr(ip, cidr)
}

/// Typed variant of [`in_cidr`].
pub fn ip_in_cidr(ip: IpAddr, cidr: &str) -> bool {
    cidr.parse::<CidrRange>()
        .map(|range| range.contains(ip))
        .unwrap_or(false)
}

/// IPv4 private and reserved ranges rejected unless private addresses are allowed.
const RESERVED_V4: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "240.0.0.0/4",
];

/// IPv6 private and reserved ranges.
const RESERVED_V6: &[&str] = &[
    "::/128",
    "::1/128",
    "::ffff:0:0/96",
    "64:ff9b::/96",
    "100::/64",
    "2001:db8::/32",
    "fc00::/7",
    "fe80::/10",
];

lazy_static! {
    static ref RESERVED_RANGES: Vec<CidrRange> = RESERVED_V4
        .iter()
        .chain(RESERVED_V6.iter())
        .map(|s| s.parse().unwrap())
        .collect();
}

/// Whether `ip` is private, loopback, link-local or otherwise reserved.
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    RESERVED_RANGES.iter().any(|range| range.contains(ip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ipv4_prefix_boundaries() {
        assert!(in_cidr("10.1.2.3", "10.0.0.0/8"));
        // /9 spans 10.0.0.0 - 10.127.255.255
        assert!(in_cidr("10.1.2.3", "10.0.0.0/9"));
        assert!(!in_cidr("10.200.2.3", "10.0.0.0/9"));
        assert!(in_cidr("10.1.2.3", "10.1.2.3/32"));
        assert!(!in_cidr("10.1.2.4", "10.1.2.3/32"));
        assert!(in_cidr("8.8.8.8", "0.0.0.0/0"));
    }

    #[test]
    fn test_literal_entries() {
        assert!(in_cidr("203.0.113.7", "203.0.113.7"));
        assert!(!in_cidr("203.0.113.8", "203.0.113.7"));
        assert!(in_cidr("::1", "::1"));
    }

    #[test]
    fn test_ipv6_partial_byte() {
        assert!(in_cidr("2001:db8::1", "2001:db8::/32"));
        assert!(!in_cidr("2001:db9::1", "2001:db8::/32"));
        // /33 splits the fifth byte: 0x00 vs 0x80
        assert!(in_cidr("2001:db8:7fff::1", "2001:db8::/33"));
        assert!(!in_cidr("2001:db8:8000::1", "2001:db8::/33"));
        assert!(in_cidr("fe80::1", "fe80::/10"));
        assert!(in_cidr("febf::1", "fe80::/10"));
        assert!(!in_cidr("fec0::1", "fe80::/10"));
    }

    #[test]
    fn test_family_mismatch_and_garbage() {
        assert!(!in_cidr("10.0.0.1", "::/0"));
        assert!(!in_cidr("::1", "0.0.0.0/0"));
        assert!(!in_cidr("not-an-ip", "10.0.0.0/8"));
        assert!(!in_cidr("10.0.0.1", "10.0.0.0/33"));
        assert!(!in_cidr("10.0.0.1", "10.0.0.0/x"));
    }

    #[test]
    fn test_reserved_ranges() {
        assert!(is_private_or_reserved("192.168.1.1".parse().unwrap()));
        assert!(is_private_or_reserved("127.0.0.1".parse().unwrap()));
        assert!(is_private_or_reserved("fd00::1".parse().unwrap()));
        assert!(is_private_or_reserved("::1".parse().unwrap()));
        assert!(!is_private_or_reserved("8.8.8.8".parse().unwrap()));
        assert!(!is_private_or_reserved("2606:4700::1111".parse().unwrap()));
    }

    proptest! {
        #[test]
        fn prop_zero_prefix_matches_family(a in any::<u32>(), b in any::<u128>()) {
            let v4 = Ipv4Addr::from(a).to_string();
            let v6 = Ipv6Addr::from(b).to_string();
            let v4_cidr = format!("{}/0", v4);
            let v6_cidr = format!("{}/0", v6);
            prop_assert!(in_cidr(&v4, &v4_cidr));
            prop_assert!(in_cidr(&v6, &v6_cidr));
            prop_assert!(in_cidr(&v4, "1.2.3.4/0"));
        }

        #[test]
        fn prop_full_prefix_is_exact(a in any::<u32>(), b in any::<u32>()) {
            let x = Ipv4Addr::from(a).to_string();
            let y = Ipv4Addr::from(b).to_string();
            prop_assert_eq!(in_cidr(&y, &format!("{}/32", x)), a == b);
        }
    }
}
