//! Request context management.
//!
//! Carries what the caller knows about the incoming request: identifiers for
//! logging, the direct peer and raw headers for client address resolution,
//! and the raw request body for hooks that need fields outside the record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::logging::structured::LogContext;

/// Keys copied from the context into `meta` before any hook runs.
pub const SEEDED_KEYS: &[&str] = &["client_ip", "user_agent", "country", "request_id", "referer"];

/// Context for a single submission request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub received_at: DateTime<Utc>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub referer: Option<String>,
    /// Address of the direct peer, before proxy resolution.
    pub remote_addr: Option<String>,
    pub headers: HashMap<String, String>,
    pub raw_body: HashMap<String, String>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: format!("req-{}", &Uuid::new_v4().to_string()[..8]),
            received_at: Utc::now(),
            client_ip: None,
            user_agent: None,
            country: None,
            referer: None,
            remote_addr: None,
            headers: HashMap::new(),
            raw_body: HashMap::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        if !request_id.trim().is_empty() {
            self.request_id = request_id.trim().to_string();
        }
        self
    }

    /// Set the receive time from RFC 3339; unparseable input keeps the current value.
    pub fn with_received_at(mut self, timestamp: &str) -> Self {
        if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
            self.received_at = dt.with_timezone(&Utc);
        }
        self
    }

    pub fn with_client_ip(mut self, ip: &str) -> Self {
        self.client_ip = Some(ip.to_string());
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn with_referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string());
        self
    }

    pub fn with_remote_addr(mut self, remote_addr: &str) -> Self {
        self.remote_addr = Some(remote_addr.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_raw_field(mut self, name: &str, value: &str) -> Self {
        self.raw_body.insert(name.to_string(), value.to_string());
        self
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.request_id)
    }

    /// Copy the whitelisted, non-empty context values into `meta`.
    pub fn seed_meta(&self, meta: &mut Map<String, Value>) {
        for key in SEEDED_KEYS {
            let value = match *key {
                "client_ip" => self.client_ip.as_deref(),
                "user_agent" => self.user_agent.as_deref(),
                "country" => self.country.as_deref(),
                "request_id" => Some(self.request_id.as_str()),
                "referer" => self.referer.as_deref(),
                _ => None,
            };
            if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
                meta.insert(key.to_string(), Value::String(v.to_string()));
            }
        }
    }
}
