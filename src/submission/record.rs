//! The live, mutable submission record and its render projection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::snapshot::ReadOnlySnapshot;

/// A displayable body entry.
///
/// Untagged so that `{"text": .., "html": ..}` objects deserialize as pairs
/// and anything else lands in `Scalar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyValue {
    Pair {
        #[serde(default)]
        text: String,
        #[serde(default)]
        html: String,
    },
    Scalar(Value),
}

impl BodyValue {
    pub fn text(value: impl Into<String>) -> Self {
        BodyValue::Scalar(Value::String(value.into()))
    }

    pub fn pair(text: impl Into<String>, html: impl Into<String>) -> Self {
        BodyValue::Pair {
            text: text.into(),
            html: html.into(),
        }
    }

    /// Well-formed entries are plain scalars or pairs with at least one channel.
    ///
    /// Renderers skip anything else rather than failing.
    pub fn is_well_formed(&self) -> bool {
        match self {
            BodyValue::Pair { text, html } => !(text.is_empty() && html.is_empty()),
            BodyValue::Scalar(v) => !(v.is_array() || v.is_object()),
        }
    }
}

/// The in-flight submission. Owned by the pipeline for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionRecord {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub phone: String,
    /// Display data for the outbound message.
    pub body: BTreeMap<String, BodyValue>,
    /// Internal/diagnostic data. Never rendered.
    pub meta: Map<String, Value>,
}

impl SubmissionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn with_body(mut self, key: impl Into<String>, value: BodyValue) -> Self {
        self.body.insert(key.into(), value);
        self
    }

    /// Look up one of the named scalar fields.
    pub fn field(&self, name: &str) -> Option<&str> {
        field_of(&self.name, &self.email, &self.subject, &self.message, &self.phone, name)
    }

    /// Freeze the current state into an independent, immutable copy.
    pub fn freeze(&self) -> ReadOnlySnapshot {
        ReadOnlySnapshot::from_record(self)
    }

    /// The subset exposed to rendering: fields and body, never `meta`.
    pub fn projection(&self) -> Projection {
        Projection {
            name: self.name.clone(),
            email: self.email.clone(),
            subject: self.subject.clone(),
            message: self.message.clone(),
            phone: self.phone.clone(),
            body: self.body.clone(),
        }
    }
}

pub(crate) fn field_of<'a>(
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
    phone: &'a str,
    field: &str,
) -> Option<&'a str> {
    match field {
        "name" => Some(name),
        "email" => Some(email),
        "subject" => Some(subject),
        "message" => Some(message),
        "phone" => Some(phone),
        _ => None,
    }
}

/// Sanitized view handed to renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Projection {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub phone: String,
    pub body: BTreeMap<String, BodyValue>,
}

/// Convert a JSON value to display text.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_value_untagged_deserialize() {
        let pair: BodyValue =
            serde_json::from_value(json!({"text": "a", "html": "<b>a</b>"})).unwrap();
        assert_eq!(pair, BodyValue::pair("a", "<b>a</b>"));

        let scalar: BodyValue = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(scalar, BodyValue::Scalar(json!(42)));
        assert!(scalar.is_well_formed());

        let malformed: BodyValue = serde_json::from_value(json!({"other": 1})).unwrap();
        assert!(!malformed.is_well_formed());
        assert!(!BodyValue::Scalar(json!({"nested": true})).is_well_formed());
        assert!(!BodyValue::pair("", "").is_well_formed());
    }

    #[test]
    fn test_projection_excludes_meta() {
        let mut record = SubmissionRecord::new()
            .with_name("A")
            .with_body("company", BodyValue::text("Acme"));
        record.meta.insert("client_ip".to_string(), json!("8.8.8.8"));

        let projection = serde_json::to_value(record.projection()).unwrap();
        assert_eq!(projection["name"], "A");
        assert_eq!(projection["body"]["company"], "Acme");
        assert!(projection.get("meta").is_none());
    }

    #[test]
    fn test_field_lookup() {
        let record = SubmissionRecord::new().with_email("a@b.com");
        assert_eq!(record.field("email"), Some("a@b.com"));
        assert_eq!(record.field("phone"), Some(""));
        assert_eq!(record.field("fax"), None);
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("x")), "x");
        assert_eq!(value_to_string(&json!(1.5)), "1.5");
        assert_eq!(value_to_string(&json!(null)), "");
        assert_eq!(value_to_string(&json!([1])), "[1]");
    }
}
