//! Threat scanning for submitted content.
//!
//! Detects common injection payloads in user-supplied text:
//! - XSS patterns
//! - SQL injection patterns
//! - Command injection patterns
//! - Path traversal patterns
//!
//! Nothing is rewritten here; the scan only reports. Whether a detection
//! rejects the submission is up to the `ContentSafety` validator.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

/// Per-field size limit in bytes.
pub const MAX_FIELD_SIZE: usize = 100_000;

lazy_static! {
    /// XSS detection patterns
    static ref XSS_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)<script[^>]*>").unwrap(),
        Regex::new(r"(?i)javascript:").unwrap(),
        Regex::new(r"(?i)\bon\w+\s*=").unwrap(),
        Regex::new(r"(?i)<iframe[^>]*>").unwrap(),
        Regex::new(r"(?i)<object[^>]*>").unwrap(),
        Regex::new(r"(?i)<embed[^>]*>").unwrap(),
    ];

    /// SQL injection detection patterns
    static ref SQL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)'\s*(or|and)\s*'?\d").unwrap(),
        Regex::new(r"(?i);\s*(drop|delete|truncate|alter)\s").unwrap(),
        Regex::new(r"(?i)union\s+(all\s+)?select").unwrap(),
    ];

    /// Command injection detection patterns
    static ref CMD_PATTERNS: Vec<Regex> = vec![
        Regex::new(r";\s*(rm|cat|wget|curl|chmod)\s").unwrap(),
        Regex::new(r"\|\s*(bash|sh|zsh|cmd)\b").unwrap(),
        Regex::new(r"\$\([^)]+\)").unwrap(),
    ];

    /// Path traversal detection patterns
    static ref PATH_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"\.\.[\\/]").unwrap(),
        Regex::new(r"[\\/]etc[\\/](passwd|shadow)").unwrap(),
    ];
}

/// Counts of detections by category.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ThreatReport {
    pub xss: usize,
    pub sql: usize,
    pub cmd: usize,
    pub path: usize,
    pub oversized: usize,
}

impl ThreatReport {
    pub fn total(&self) -> usize {
        self.xss + self.sql + self.cmd + self.path + self.oversized
    }

    pub fn has_detections(&self) -> bool {
        self.total() > 0
    }

    /// Add another report's counts into this one.
    pub fn absorb(&mut self, other: &ThreatReport) {
        self.xss += other.xss;
        self.sql += other.sql;
        self.cmd += other.cmd;
        self.path += other.path;
        self.oversized += other.oversized;
    }
}

/// Scan one string.
pub fn scan_text(s: &str) -> ThreatReport {
    let count = |patterns: &[Regex]| patterns.iter().filter(|p| p.is_match(s)).count();

    ThreatReport {
        xss: count(XSS_PATTERNS.as_slice()),
        sql: count(SQL_PATTERNS.as_slice()),
        cmd: count(CMD_PATTERNS.as_slice()),
        path: count(PATH_PATTERNS.as_slice()),
        oversized: usize::from(s.len() > MAX_FIELD_SIZE),
    }
}

/// Recursively scan a JSON value, keys included.
pub fn scan_value(value: &Value) -> ThreatReport {
    let mut report = ThreatReport::default();
    match value {
        Value::String(s) => report.absorb(&scan_text(s)),
        Value::Array(arr) => {
            for item in arr {
                report.absorb(&scan_value(item));
            }
        }
        Value::Object(obj) => {
            for (key, val) in obj {
                report.absorb(&scan_text(key));
                report.absorb(&scan_value(val));
            }
        }
        _ => {}
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_xss_detection() {
        let report = scan_text("<script>alert('xss')</script>");
        assert_eq!(report.xss, 1);
        assert!(report.has_detections());
    }

    #[test]
    fn test_sql_injection_detection() {
        let report = scan_text("1; DROP TABLE users; --");
        assert_eq!(report.sql, 1);
    }

    #[test]
    fn test_nested_value_scan() {
        let report = scan_value(&json!({
            "note": ["fine", "../../etc/passwd"],
            "onclick=": "x"
        }));
        assert_eq!(report.path, 2);
        assert_eq!(report.xss, 1);
    }

    #[test]
    fn test_clean_text() {
        let report = scan_text("Hello, I would like a quote for 3 units. Thanks!");
        assert!(!report.has_detections());
        assert_eq!(report.total(), 0);
    }
}
