//! Built-in senders and their configuration.
//!
//! Real mail transports live outside this crate and are injected through
//! the `Sender` trait. The two here cover wiring without a transport: one
//! collects messages in memory, one logs them.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::message::{OutboundMessage, SendError, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Memory,
    Log,
}

/// Addressing and transport selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Sender built when none is injected. `None` means no fallback.
    pub kind: Option<TransportKind>,
    pub to: Vec<String>,
    pub from: String,
    pub subject_prefix: Option<String>,
    /// Use the submitter's email as Reply-To.
    pub reply_to_submitter: bool,
}

/// Build the fallback sender described by `config`, if any.
pub fn sender_from_config(config: &TransportConfig) -> Option<Arc<dyn Sender>> {
    let sender: Arc<dyn Sender> = match config.kind? {
        TransportKind::Memory => Arc::new(MemorySender::new()),
        TransportKind::Log => Arc::new(LogSender),
    };
    log::info!("SENDER_CONSTRUCTED kind={:?}", config.kind);
    Some(sender)
}

/// Keeps every message it is asked to send.
#[derive(Debug, Default)]
pub struct MemorySender {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl MemorySender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Sender for MemorySender {
    fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Logs a one-line summary instead of delivering.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSender;

impl Sender for LogSender {
    fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        log::info!(
            "MESSAGE_RELAYED to={:?} subject={:?} html_bytes={} text_bytes={}",
            message.to,
            message.subject,
            message.html.len(),
            message.text.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_from_config() {
        assert!(sender_from_config(&TransportConfig::default()).is_none());

        let config: TransportConfig =
            serde_json::from_str(r#"{"kind": "memory", "to": ["ops@example.com"]}"#).unwrap();
        let sender = sender_from_config(&config).unwrap();
        assert!(sender.send(&OutboundMessage::default()).is_ok());
    }

    #[test]
    fn test_memory_sender_collects() {
        let sender = MemorySender::new();
        let message = OutboundMessage {
            subject: "hello".to_string(),
            ..OutboundMessage::default()
        };
        sender.send(&message).unwrap();
        sender.send(&message).unwrap();
        assert_eq!(sender.count(), 2);
        assert_eq!(sender.sent()[0].subject, "hello");
    }

    #[test]
    fn test_log_sender_accepts() {
        assert!(LogSender.send(&OutboundMessage::default()).is_ok());
    }
}
