//! Outbound message and the sender collaborator contract.

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// A fully rendered message ready for a transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub to: Vec<String>,
    pub from: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Transport failure.
///
/// `Transport` carries a stable code that takes precedence over the generic
/// `ERR_SEND_FAILED`; anything else is wrapped in `Other`.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("transport failure {code}: {detail}")]
    Transport {
        code: String,
        detail: String,
        context: Map<String, Value>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SendError {
    pub fn transport(code: impl Into<String>, detail: impl Into<String>) -> Self {
        SendError::Transport {
            code: code.into(),
            detail: detail.into(),
            context: Map::new(),
        }
    }

    pub fn with_context(self, key: impl Into<String>, value: Value) -> Self {
        match self {
            SendError::Transport {
                code,
                detail,
                mut context,
            } => {
                context.insert(key.into(), value);
                SendError::Transport {
                    code,
                    detail,
                    context,
                }
            }
            other => other,
        }
    }

    /// The transport's own code, if it supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            SendError::Transport { code, .. } if !code.trim().is_empty() => Some(code.as_str()),
            _ => None,
        }
    }

    /// Diagnostic stored under `meta.transport_error`.
    pub fn diagnostic(&self) -> Value {
        match self {
            SendError::Transport {
                code,
                detail,
                context,
            } => json!({"code": code, "detail": detail, "context": context}),
            SendError::Other(e) => json!({"code": Value::Null, "detail": e.to_string()}),
        }
    }
}

/// Delivers an outbound message. One call per pipeline run, no retries.
pub trait Sender: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<(), SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_code_preferred() {
        let err = SendError::transport("ERR_SMTP_AUTH", "535 authentication failed")
            .with_context("host", json!("mail.example.com"));
        assert_eq!(err.code(), Some("ERR_SMTP_AUTH"));
        assert_eq!(err.diagnostic()["context"]["host"], "mail.example.com");

        let generic = SendError::from(anyhow::anyhow!("connection reset"));
        assert_eq!(generic.code(), None);
        assert_eq!(generic.diagnostic()["detail"], "connection reset");
    }

    #[test]
    fn test_blank_transport_code_ignored() {
        assert_eq!(SendError::transport(" ", "x").code(), None);
    }
}
