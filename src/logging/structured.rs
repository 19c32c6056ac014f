//! Structured logging utilities.
//!
//! Provides context-aware logging with request_id and validator label
//! included in every log message.

use std::fmt;

use serde_json::Value;

/// Logging context for a single pipeline run.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub request_id: String,
    pub validator: Option<String>,
}

impl LogContext {
    pub fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            validator: None,
        }
    }

    pub fn with_validator(&self, label: &str) -> Self {
        Self {
            request_id: self.request_id.clone(),
            validator: Some(label.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.validator {
            Some(label) => write!(f, "[request={}] [validator={}]", self.request_id, label),
            None => write!(f, "[request={}]", self.request_id),
        }
    }
}

/// Logging collaborator used by the pipeline for outcome reporting.
///
/// Fire-and-forget: nothing returned by a logger is ever consulted.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str, context: &Value);
    fn warning(&self, message: &str, context: &Value);
    fn error(&self, message: &str, context: &Value);
}

/// Default logger forwarding to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateLogger;

impl Logger for LogCrateLogger {
    fn info(&self, message: &str, context: &Value) {
        log::info!("{} {}", message, render_context(context));
    }

    fn warning(&self, message: &str, context: &Value) {
        log::warn!("{} {}", message, render_context(context));
    }

    fn error(&self, message: &str, context: &Value) {
        log::error!("{} {}", message, render_context(context));
    }
}

/// Flatten a JSON object into `key=value` pairs, sorted by key.
pub fn render_context(context: &Value) -> String {
    match context {
        Value::Object(map) => {
            let mut pairs: Vec<String> = map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{}={}", k, s),
                    other => format!("{}={}", k, other),
                })
                .collect();
            pairs.sort();
            pairs.join(" ")
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::info!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::warn!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

/// Log an error message with context.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::error!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::debug!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_context_display() {
        let ctx = LogContext::new("req-123");
        assert_eq!(format!("{}", ctx), "[request=req-123]");

        let ctx_with_validator = ctx.with_validator("email");
        assert_eq!(
            format!("{}", ctx_with_validator),
            "[request=req-123] [validator=email]"
        );
    }

    #[test]
    fn test_render_context_sorted_pairs() {
        let rendered = render_context(&json!({"code": "OK_SENT", "attempts": 1}));
        assert_eq!(rendered, "attempts=1 code=OK_SENT");
        assert_eq!(render_context(&Value::Null), "");
    }

    #[test]
    fn test_macros_expand() {
        let ctx = LogContext::new("req-1");
        crate::log_info!(ctx, "PIPELINE_START", validators = 2);
        crate::log_debug!(ctx, "SNAPSHOT_TAKEN", label = "required");
    }
}
