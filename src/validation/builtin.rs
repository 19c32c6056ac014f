//! Stock validators.
//!
//! Failure codes are derived from the field name where the check is
//! field-scoped (`EMAIL_REQUIRED`, `MESSAGE_TOO_LONG`) so the message
//! resolver can key on them directly.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;

use crate::security::sanitizer::{scan_text, scan_value, ThreatReport};
use crate::submission::{value_to_string, BodyValue, ReadOnlySnapshot};

use super::outcome::{diagnostic, ValidationFailure, ValidationOutcome};
use super::registry::Validator;

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap();
}

fn field_code(field: &str, suffix: &str) -> String {
    format!("{}_{}", field.to_ascii_uppercase(), suffix)
}

/// Text of a named field, falling back to a body entry of the same key.
fn text_of(snapshot: &ReadOnlySnapshot, field: &str) -> String {
    if let Some(v) = snapshot.field(field) {
        return v.to_string();
    }
    match snapshot.body().get(field) {
        Some(BodyValue::Scalar(v)) => value_to_string(v),
        Some(BodyValue::Pair { text, .. }) if !text.is_empty() => text.clone(),
        Some(BodyValue::Pair { html, .. }) => html.clone(),
        None => String::new(),
    }
}

/// Every listed field must be non-blank. Fails on the first missing one.
#[derive(Debug, Clone)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for RequiredFields {
    fn check(&self, snapshot: &ReadOnlySnapshot) -> anyhow::Result<ValidationOutcome> {
        for field in &self.fields {
            if text_of(snapshot, field).trim().is_empty() {
                return Ok(ValidationOutcome::fail(
                    ValidationFailure::new(field_code(field, "REQUIRED"))
                        .with_field(field.as_str())
                        .with_diagnostic("missing", json!(field)),
                ));
            }
        }
        Ok(ValidationOutcome::ok_with(diagnostic(
            json!({"checked": self.fields}),
        )))
    }

    fn kind(&self) -> &'static str {
        "required"
    }
}

/// Syntactic email check. An empty value passes; pair it with `RequiredFields`.
#[derive(Debug, Clone)]
pub struct EmailFormat {
    field: String,
}

impl EmailFormat {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Default for EmailFormat {
    fn default() -> Self {
        Self::new("email")
    }
}

impl Validator for EmailFormat {
    fn check(&self, snapshot: &ReadOnlySnapshot) -> anyhow::Result<ValidationOutcome> {
        let value = text_of(snapshot, &self.field);
        let value = value.trim();

        if value.is_empty() {
            return Ok(ValidationOutcome::ok_with(diagnostic(
                json!({"skipped": "empty"}),
            )));
        }

        if !EMAIL_PATTERN.is_match(value) {
            return Ok(ValidationOutcome::fail(
                ValidationFailure::new(field_code(&self.field, "INVALID"))
                    .with_field(self.field.as_str())
                    .with_diagnostic("length", json!(value.chars().count())),
            ));
        }

        let domain = value.rsplit('@').next().unwrap_or_default();
        Ok(ValidationOutcome::ok_with(diagnostic(
            json!({"domain": domain.to_ascii_lowercase()}),
        )))
    }

    fn kind(&self) -> &'static str {
        "email"
    }
}

/// Character-count bounds on one field.
#[derive(Debug, Clone)]
pub struct LengthLimit {
    field: String,
    min: Option<usize>,
    max: Option<usize>,
}

impl LengthLimit {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            min: None,
            max: None,
        }
    }

    pub fn min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }
}

impl Validator for LengthLimit {
    fn check(&self, snapshot: &ReadOnlySnapshot) -> anyhow::Result<ValidationOutcome> {
        let length = text_of(snapshot, &self.field).trim().chars().count();

        let violated = match (self.min, self.max) {
            (Some(min), _) if length < min => Some(("TOO_SHORT", "min", min)),
            (_, Some(max)) if length > max => Some(("TOO_LONG", "max", max)),
            _ => None,
        };

        Ok(match violated {
            Some((suffix, bound, limit)) => ValidationOutcome::fail(
                ValidationFailure::new(field_code(&self.field, suffix))
                    .with_field(self.field.as_str())
                    .with_diagnostic("length", json!(length))
                    .with_diagnostic(bound, json!(limit)),
            ),
            None => ValidationOutcome::ok_with(diagnostic(json!({"length": length}))),
        })
    }

    fn kind(&self) -> &'static str {
        "length"
    }
}

/// Rejects submissions whose honeypot trap was filled in.
///
/// The trap value is read from `meta`, where `HoneypotCapture` puts it.
#[derive(Debug, Clone)]
pub struct HoneypotCheck {
    meta_key: String,
}

impl HoneypotCheck {
    pub fn new(meta_key: impl Into<String>) -> Self {
        Self {
            meta_key: meta_key.into(),
        }
    }
}

impl Default for HoneypotCheck {
    fn default() -> Self {
        Self::new("honeypot")
    }
}

impl Validator for HoneypotCheck {
    fn check(&self, snapshot: &ReadOnlySnapshot) -> anyhow::Result<ValidationOutcome> {
        let tripped = snapshot
            .meta()
            .get(&self.meta_key)
            .map(|v| !value_to_string(v).trim().is_empty())
            .unwrap_or(false);

        if tripped {
            return Ok(ValidationOutcome::fail(
                ValidationFailure::new("SPAM_DETECTED")
                    .with_diagnostic("trap", json!(self.meta_key)),
            ));
        }
        Ok(ValidationOutcome::ok())
    }

    fn kind(&self) -> &'static str {
        "honeypot"
    }
}

/// Rejects injection payloads in text fields and, optionally, the body.
#[derive(Debug, Clone)]
pub struct ContentSafety {
    fields: Vec<String>,
    include_body: bool,
}

impl ContentSafety {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            include_body: false,
        }
    }

    pub fn include_body(mut self, include: bool) -> Self {
        self.include_body = include;
        self
    }
}

impl Default for ContentSafety {
    fn default() -> Self {
        Self::new(["name", "subject", "message"])
    }
}

impl Validator for ContentSafety {
    fn check(&self, snapshot: &ReadOnlySnapshot) -> anyhow::Result<ValidationOutcome> {
        let mut flagged: Vec<&str> = Vec::new();
        let mut total = ThreatReport::default();

        for field in &self.fields {
            let report = scan_text(&text_of(snapshot, field));
            if report.has_detections() {
                flagged.push(field);
                total.absorb(&report);
            }
        }

        if self.include_body {
            for (key, value) in snapshot.body() {
                let report = match value {
                    BodyValue::Scalar(v) => scan_value(v),
                    BodyValue::Pair { text, .. } => scan_text(text),
                };
                if report.has_detections() {
                    flagged.push(key);
                    total.absorb(&report);
                }
            }
        }

        if let Some(first) = flagged.first() {
            log::debug!(
                "CONTENT_THREATS fields={:?} xss={} sql={} cmd={} path={}",
                flagged,
                total.xss,
                total.sql,
                total.cmd,
                total.path
            );
            return Ok(ValidationOutcome::fail(
                ValidationFailure::new("CONTENT_REJECTED")
                    .with_field(*first)
                    .with_diagnostic("fields", json!(flagged))
                    .with_diagnostic("threats", serde_json::to_value(&total)?),
            ));
        }

        let body_entries = if self.include_body { snapshot.body().len() } else { 0 };
        Ok(ValidationOutcome::ok_with(diagnostic(json!({
            "scanned": self.fields.len() + body_entries,
        }))))
    }

    fn kind(&self) -> &'static str {
        "content"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::SubmissionRecord;

    fn snap(record: &SubmissionRecord) -> ReadOnlySnapshot {
        record.freeze()
    }

    #[test]
    fn test_required_fields_first_missing_wins() {
        let record = SubmissionRecord::new().with_name("A").with_message("hi");
        let outcome = RequiredFields::new(["name", "email", "message"])
            .check(&snap(&record))
            .unwrap();

        match outcome {
            ValidationOutcome::Failed(f) => {
                assert_eq!(f.code, "EMAIL_REQUIRED");
                assert_eq!(f.field.as_deref(), Some("email"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_required_fields_reads_body() {
        let record = SubmissionRecord::new().with_body("company", BodyValue::text("Acme"));
        let outcome = RequiredFields::new(["company"]).check(&snap(&record)).unwrap();
        assert!(outcome.is_ok());

        let blank = SubmissionRecord::new().with_body("company", BodyValue::text("  "));
        let outcome = RequiredFields::new(["company"]).check(&snap(&blank)).unwrap();
        assert!(!outcome.is_ok());
    }

    #[test]
    fn test_email_format() {
        let v = EmailFormat::default();
        let ok = v.check(&snap(&SubmissionRecord::new().with_email("a@b.com"))).unwrap();
        assert_eq!(ok.to_record(), json!({"domain": "b.com"}));

        let bad = v.check(&snap(&SubmissionRecord::new().with_email("a@b"))).unwrap();
        assert_eq!(bad.to_record()["error_code"], "EMAIL_INVALID");

        let empty = v.check(&snap(&SubmissionRecord::new())).unwrap();
        assert!(empty.is_ok());
    }

    #[test]
    fn test_length_limit() {
        let v = LengthLimit::new("message").min(3).max(5);
        let short = v.check(&snap(&SubmissionRecord::new().with_message("hi"))).unwrap();
        assert_eq!(short.to_record()["error_code"], "MESSAGE_TOO_SHORT");

        let long = v.check(&snap(&SubmissionRecord::new().with_message("héllo!"))).unwrap();
        assert_eq!(long.to_record()["error_code"], "MESSAGE_TOO_LONG");
        assert_eq!(long.to_record()["diagnostic"]["length"], 6);

        let fine = v.check(&snap(&SubmissionRecord::new().with_message("héllo"))).unwrap();
        assert!(fine.is_ok());
    }

    #[test]
    fn test_honeypot_check() {
        let mut record = SubmissionRecord::new();
        assert!(HoneypotCheck::default().check(&snap(&record)).unwrap().is_ok());

        record.meta.insert("honeypot".to_string(), json!("http://spam.example"));
        let outcome = HoneypotCheck::default().check(&snap(&record)).unwrap();
        assert_eq!(outcome.to_record()["error_code"], "SPAM_DETECTED");
    }

    #[test]
    fn test_content_safety() {
        let record = SubmissionRecord::new()
            .with_message("hello <script>alert(1)</script>")
            .with_body("notes", BodyValue::text("see ../../etc/passwd"));

        let outcome = ContentSafety::default().check(&snap(&record)).unwrap();
        let entry = outcome.to_record();
        assert_eq!(entry["error_code"], "CONTENT_REJECTED");
        assert_eq!(entry["field"], "message");
        assert_eq!(entry["diagnostic"]["fields"], json!(["message"]));

        let outcome = ContentSafety::default()
            .include_body(true)
            .check(&snap(&record))
            .unwrap();
        assert_eq!(outcome.to_record()["diagnostic"]["fields"], json!(["message", "notes"]));

        let clean = SubmissionRecord::new().with_message("just a question");
        assert!(ContentSafety::default().check(&snap(&clean)).unwrap().is_ok());
    }
}
