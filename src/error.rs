//! Setup-time errors.
//!
//! Everything here is raised while a pipeline is being configured and is
//! never part of the runtime result taxonomy: a `ConfigError` means the
//! caller wired the pipeline wrong.

use thiserror::Error;

/// Configuration failure raised while building a pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A validator was registered with an unusable or duplicate label.
    #[error("invalid-validator: {label:?}: {reason}")]
    InvalidValidator { label: String, reason: String },

    /// A hook scope names no labels, or names a blank one.
    #[error("invalid-hook-scope: {0}")]
    InvalidHookScope(String),

    /// A trusted proxy entry is neither an address nor a CIDR range.
    #[error("invalid-trusted-proxy: {entry:?}: {reason}")]
    InvalidTrustedProxy { entry: String, reason: String },

    /// The configuration document could not be parsed.
    #[error("invalid-config: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}
