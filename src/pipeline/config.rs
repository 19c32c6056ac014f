//! Pipeline configuration.
//!
//! Loaded from JSON; every field has a default so an empty document `{}`
//! is a valid configuration (no trusted proxies, no fallback transport).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::security::proxy::TrustPolicy;
use crate::transport::senders::TransportConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub trust: TrustPolicy,
    pub transport: TransportConfig,
    /// Per-code message overrides for the default resolver.
    pub messages: HashMap<String, String>,
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        log::debug!(
            "CONFIG_LOADED trusted_proxies={} headers={:?} transport={:?} overrides={}",
            config.trust.trusted_proxies.len(),
            config.trust.headers,
            config.transport.kind,
            config.messages.len()
        );
        Ok(config)
    }
}
