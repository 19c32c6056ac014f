//! Validator outcomes and the per-label records kept in `meta.validators`.

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Structured, field-scoped validation failure.
///
/// Also an `Error`, so a validator may return it through `anyhow` instead of
/// `ValidationOutcome::Failed`; the pipeline still recognizes its code.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("validation failed: {code}")]
pub struct ValidationFailure {
    pub code: String,
    pub field: Option<String>,
    pub diagnostic: Map<String, Value>,
}

impl ValidationFailure {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            field: None,
            diagnostic: Map::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_diagnostic(mut self, key: impl Into<String>, value: Value) -> Self {
        self.diagnostic.insert(key.into(), value);
        self
    }

    /// The entry appended to `meta.validators.<label>`.
    pub fn to_record(&self) -> Value {
        json!({
            "status": "fail",
            "error_code": self.code,
            "field": self.field,
            "diagnostic": self.diagnostic,
        })
    }
}

/// Result of one validator run.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Passed(Option<Map<String, Value>>),
    Failed(ValidationFailure),
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        ValidationOutcome::Passed(None)
    }

    pub fn ok_with(diagnostic: Map<String, Value>) -> Self {
        ValidationOutcome::Passed(Some(diagnostic))
    }

    pub fn fail(failure: ValidationFailure) -> Self {
        ValidationOutcome::Failed(failure)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ValidationOutcome::Passed(_))
    }

    /// The entry appended to `meta.validators.<label>`.
    ///
    /// A pass without diagnostics is stored as `{"status": "ok"}`.
    pub fn to_record(&self) -> Value {
        match self {
            ValidationOutcome::Passed(Some(diag)) => Value::Object(diag.clone()),
            ValidationOutcome::Passed(None) => json!({"status": "ok"}),
            ValidationOutcome::Failed(failure) => failure.to_record(),
        }
    }
}

/// Build a diagnostic map from `json!({...})`; non-objects yield an empty map.
pub fn diagnostic(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
