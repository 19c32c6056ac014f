//! Trusted-proxy client address resolution.
//!
//! Forwarding headers are only honored when the direct peer is inside one of
//! the configured trusted ranges; otherwise they are ignored entirely and the
//! peer address itself is used. This prevents clients from spoofing their
//! address through `X-Forwarded-For` manipulation.

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::security::cidr::{is_private_or_reserved, CidrRange};

/// RFC 7239 structured forwarding header.
pub const FORWARDED: &str = "forwarded";
/// Legacy comma-separated address list.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Trust policy for client address resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustPolicy {
    /// Trusted peers: literal addresses or CIDR ranges.
    pub trusted_proxies: Vec<String>,
    /// Headers to consult, highest priority first.
    pub headers: Vec<String>,
    /// Accept private/reserved addresses as client addresses.
    pub allow_private: bool,
    /// Copy the User-Agent header into `meta.user_agent`.
    pub attach_user_agent: bool,
    /// Copy the Referer header into `meta.referer`.
    pub attach_referer: bool,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            trusted_proxies: Vec::new(),
            headers: vec![
                "Forwarded".to_string(),
                "X-Forwarded-For".to_string(),
                "X-Real-IP".to_string(),
            ],
            allow_private: false,
            attach_user_agent: false,
            attach_referer: false,
        }
    }
}

/// Resolves the client address from headers and the direct peer.
#[derive(Debug, Clone)]
pub struct TrustedProxyResolver {
    policy: TrustPolicy,
    trusted: Vec<CidrRange>,
}

impl TrustedProxyResolver {
    /// Build a resolver, parsing every trusted entry up front.
    pub fn new(policy: TrustPolicy) -> Result<Self, ConfigError> {
        let trusted = policy
            .trusted_proxies
            .iter()
            .map(|entry| {
                entry
                    .parse::<CidrRange>()
                    .map_err(|e| ConfigError::InvalidTrustedProxy {
                        entry: entry.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { policy, trusted })
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    /// Whether the direct peer may have its forwarding headers honored.
    pub fn is_trusted(&self, peer: IpAddr) -> bool {
        self.trusted.iter().any(|range| range.contains(peer))
    }

    /// Resolve the best-effort client address.
    ///
    /// # Arguments
    /// * `headers` - Raw request headers (any case, CGI `HTTP_*` names accepted)
    /// * `remote_addr` - Address of the direct peer, if known
    pub fn resolve(
        &self,
        headers: &HashMap<String, String>,
        remote_addr: Option<&str>,
    ) -> Option<IpAddr> {
        let remote = remote_addr.and_then(parse_addr);

        let peer = match remote {
            Some(peer) if self.is_trusted(peer) => peer,
            _ => {
                if !headers.is_empty() {
                    log::debug!(
                        "PROXY_HEADERS_IGNORED remote={:?} reason=untrusted_peer",
                        remote_addr
                    );
                }
                return remote_addr.and_then(|r| self.filter_ip(r));
            }
        };

        for name in &self.policy.headers {
            let wanted = normalize_header_name(name);
            let Some(value) = header_value(headers, &wanted) else {
                continue;
            };

            let found = match wanted.as_str() {
                FORWARDED => self.from_forwarded(value),
                X_FORWARDED_FOR => self.from_forwarded_for(value),
                _ => self.filter_ip(value),
            };

            if let Some(ip) = found {
                log::debug!(
                    "CLIENT_ADDRESS_RESOLVED peer={} header={} client={}",
                    peer,
                    wanted,
                    ip
                );
                return Some(ip);
            }
        }

        remote_addr.and_then(|r| self.filter_ip(r))
    }

    /// Validate a candidate address.
    ///
    /// Trims whitespace and quoting, strips IPv6 brackets, and, unless
    /// private addresses are allowed, rejects private/reserved ranges.
    pub fn filter_ip(&self, value: &str) -> Option<IpAddr> {
        let ip = parse_addr(value)?;
        if !self.policy.allow_private && is_private_or_reserved(ip) {
            return None;
        }
        Some(ip)
    }

    fn from_forwarded(&self, value: &str) -> Option<IpAddr> {
        value
            .split(',')
            .filter_map(|element| {
                element.split(';').find_map(|pair| {
                    let (key, val) = pair.split_once('=')?;
                    key.trim().eq_ignore_ascii_case("for").then_some(val)
                })
            })
            .find_map(|val| self.filter_ip(strip_port(unquote(val))))
    }

    fn from_forwarded_for(&self, value: &str) -> Option<IpAddr> {
        value
            .split(',')
            .find_map(|entry| self.filter_ip(strip_port(unquote(entry))))
    }
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"').trim()
}

/// Strip a trailing port from `1.2.3.4:80` or `[::1]:80`; bare IPv6 is left alone.
fn strip_port(value: &str) -> &str {
    if let Some(rest) = value.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => &rest[..end],
            None => rest,
        };
    }
    match value.matches(':').count() {
        1 => value.split(':').next().unwrap_or(value),
        _ => value,
    }
}

fn parse_addr(value: &str) -> Option<IpAddr> {
    let value = unquote(value);
    let value = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);
    value.parse().ok()
}

/// Lowercase, `_` to `-`, and drop a CGI `http-` prefix.
fn normalize_header_name(name: &str) -> String {
    let name = name.trim().to_ascii_lowercase().replace('_', "-");
    match name.strip_prefix("http-") {
        Some(rest) => rest.to_string(),
        None => name,
    }
}

/// When several spellings normalize to `wanted`, the shortest name wins and
/// equal lengths compare bytewise, so `X-Forwarded-For` beats
/// `HTTP_X_FORWARDED_FOR` regardless of map order.
fn header_value<'a>(headers: &'a HashMap<String, String>, wanted: &str) -> Option<&'a str> {
    headers
        .iter()
        .filter(|(name, value)| {
            normalize_header_name(name) == wanted && !value.trim().is_empty()
        })
        .min_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .map(|(_, value)| value.as_str())
}

/// Case-insensitive header lookup, shared with hooks that attach headers.
pub fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    header_value(headers, &normalize_header_name(name))
}
