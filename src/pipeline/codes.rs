//! Result codes and their human-readable messages.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde_json::{Map, Value};

pub const OK_SENT: &str = "OK_SENT";
pub const ERR_VALIDATION: &str = "ERR_VALIDATION";
pub const ERR_NO_SENDER: &str = "ERR_NO_SENDER";
pub const ERR_SEND_FAILED: &str = "ERR_SEND_FAILED";
pub const ERR_UNEXPECTED: &str = "ERR_UNEXPECTED";

/// Message text plus an HTTP status a front controller may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescription {
    pub message: String,
    pub http_status: Option<u16>,
}

/// Translates a final code into text. Never influences control flow.
pub trait MessageResolver: Send + Sync {
    fn resolve(&self, code: &str, context: &Map<String, Value>) -> String;
    fn describe(&self, code: &str) -> MessageDescription;
}

lazy_static! {
    static ref DEFAULT_MESSAGES: HashMap<&'static str, (&'static str, u16)> = HashMap::from([
        (OK_SENT, ("Thank you, your message has been sent.", 200)),
        (ERR_VALIDATION, ("Please check the form and try again.", 422)),
        (ERR_NO_SENDER, ("The message could not be delivered: no transport is configured.", 503)),
        (ERR_SEND_FAILED, ("The message could not be sent. Please try again later.", 502)),
        (ERR_UNEXPECTED, ("An unexpected error occurred.", 500)),
        ("SPAM_DETECTED", ("Your submission could not be accepted.", 422)),
        ("CONTENT_REJECTED", ("Your submission contains content that is not allowed.", 422)),
    ]);

    /// Messages for field-derived codes, keyed by suffix.
    static ref SUFFIX_MESSAGES: Vec<(&'static str, &'static str)> = vec![
        ("_REQUIRED", "The {field} field is required."),
        ("_INVALID", "The {field} field is not valid."),
        ("_TOO_SHORT", "The {field} field is too short."),
        ("_TOO_LONG", "The {field} field is too long."),
    ];
}

/// Built-in English table with per-code overrides.
#[derive(Debug, Clone, Default)]
pub struct DefaultMessageResolver {
    overrides: HashMap<String, String>,
}

impl DefaultMessageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    fn template(&self, code: &str) -> (String, Option<u16>) {
        if let Some(text) = self.overrides.get(code) {
            let status = DEFAULT_MESSAGES.get(code).map(|(_, s)| *s);
            return (text.clone(), status.or_else(|| suffix_status(code)));
        }
        if let Some((text, status)) = DEFAULT_MESSAGES.get(code) {
            return (text.to_string(), Some(*status));
        }
        if let Some((_, text)) = SUFFIX_MESSAGES.iter().find(|(suffix, _)| code.ends_with(suffix)) {
            return (text.to_string(), Some(422));
        }
        (format!("The request could not be processed ({}).", code), None)
    }
}

fn suffix_status(code: &str) -> Option<u16> {
    SUFFIX_MESSAGES
        .iter()
        .any(|(suffix, _)| code.ends_with(suffix))
        .then_some(422)
}

/// Replace `{key}` placeholders with string values from `context`.
fn interpolate(template: &str, context: &Map<String, Value>) -> String {
    let mut out = template.to_string();
    for (key, value) in context {
        let placeholder = format!("{{{}}}", key);
        if out.contains(&placeholder) {
            let text = match value {
                Value::String(s) => s.replace('_', " "),
                Value::Null => continue,
                other => other.to_string(),
            };
            out = out.replace(&placeholder, &text);
        }
    }
    out.replace("{field} ", "")
}

impl MessageResolver for DefaultMessageResolver {
    fn resolve(&self, code: &str, context: &Map<String, Value>) -> String {
        interpolate(&self.template(code).0, context)
    }

    fn describe(&self, code: &str) -> MessageDescription {
        let (message, http_status) = self.template(code);
        MessageDescription {
            message: interpolate(&message, &Map::new()),
            http_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_field_codes_interpolate() {
        let r = DefaultMessageResolver::new();
        assert_eq!(
            r.resolve("EMAIL_REQUIRED", &ctx(json!({"field": "email"}))),
            "The email field is required."
        );
        assert_eq!(
            r.resolve("FIRST_NAME_TOO_LONG", &ctx(json!({"field": "first_name"}))),
            "The first name field is too long."
        );
        assert_eq!(r.resolve("PHONE_INVALID", &Map::new()), "The field is not valid.");
    }

    #[test]
    fn test_describe_status_hints() {
        let r = DefaultMessageResolver::new();
        assert_eq!(r.describe(OK_SENT).http_status, Some(200));
        assert_eq!(r.describe(ERR_SEND_FAILED).http_status, Some(502));
        assert_eq!(r.describe("EMAIL_REQUIRED").http_status, Some(422));
        assert_eq!(r.describe("SOMETHING_ELSE").http_status, None);
    }

    #[test]
    fn test_overrides_win() {
        let r = DefaultMessageResolver::with_overrides(HashMap::from([(
            OK_SENT.to_string(),
            "Danke!".to_string(),
        )]));
        assert_eq!(r.resolve(OK_SENT, &Map::new()), "Danke!");
        assert_eq!(r.describe(OK_SENT).http_status, Some(200));
    }
}
