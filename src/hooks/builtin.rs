//! Stock enrichment hooks.

use chrono::SecondsFormat;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::ConfigError;
use crate::pipeline::context::RequestContext;
use crate::security::proxy::{find_header, TrustPolicy, TrustedProxyResolver};
use crate::submission::SubmissionRecord;

use super::dispatcher::Hook;

/// Resolves the client address through the trusted-proxy rules and writes
/// it to `meta.client_ip`, replacing any value seeded from the context.
///
/// When the policy asks for it, `User-Agent` and `Referer` are copied into
/// `meta.user_agent` / `meta.referer` as well.
#[derive(Debug, Clone)]
pub struct ClientAddressHook {
    resolver: TrustedProxyResolver,
}

impl ClientAddressHook {
    pub fn new(resolver: TrustedProxyResolver) -> Self {
        Self { resolver }
    }

    pub fn from_policy(policy: TrustPolicy) -> Result<Self, ConfigError> {
        Ok(Self::new(TrustedProxyResolver::new(policy)?))
    }
}

impl Hook for ClientAddressHook {
    fn on_before_validate(
        &self,
        record: &mut SubmissionRecord,
        ctx: &RequestContext,
    ) -> anyhow::Result<()> {
        let remote = ctx.remote_addr.as_deref().or(ctx.client_ip.as_deref());
        if let Some(ip) = self.resolver.resolve(&ctx.headers, remote) {
            record
                .meta
                .insert("client_ip".to_string(), Value::String(ip.to_string()));
        }

        let policy = self.resolver.policy();
        if policy.attach_user_agent {
            if let Some(ua) = find_header(&ctx.headers, "User-Agent") {
                record
                    .meta
                    .insert("user_agent".to_string(), Value::String(ua.trim().to_string()));
            }
        }
        if policy.attach_referer {
            if let Some(referer) = find_header(&ctx.headers, "Referer") {
                record
                    .meta
                    .insert("referer".to_string(), Value::String(referer.trim().to_string()));
            }
        }
        Ok(())
    }
}

/// Copies a honeypot trap field from the raw request body into `meta`.
#[derive(Debug, Clone)]
pub struct HoneypotCapture {
    field: String,
    meta_key: String,
}

impl HoneypotCapture {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            meta_key: "honeypot".to_string(),
        }
    }

    pub fn meta_key(mut self, key: impl Into<String>) -> Self {
        self.meta_key = key.into();
        self
    }
}

impl Hook for HoneypotCapture {
    fn on_before_validate(
        &self,
        record: &mut SubmissionRecord,
        ctx: &RequestContext,
    ) -> anyhow::Result<()> {
        if let Some(value) = ctx.raw_body.get(&self.field) {
            record
                .meta
                .insert(self.meta_key.clone(), Value::String(value.clone()));
        }
        Ok(())
    }
}

/// SHA-256 over normalized email and message, for duplicate detection downstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct FingerprintHook;

impl FingerprintHook {
    pub fn compute(record: &SubmissionRecord) -> String {
        let mut hasher = Sha256::new();
        hasher.update(record.email.trim().to_lowercase().as_bytes());
        hasher.update(b"\n");
        hasher.update(record.message.trim().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Hook for FingerprintHook {
    fn on_before_validate(
        &self,
        record: &mut SubmissionRecord,
        _ctx: &RequestContext,
    ) -> anyhow::Result<()> {
        let fingerprint = Self::compute(record);
        record
            .meta
            .insert("fingerprint".to_string(), Value::String(fingerprint));
        Ok(())
    }
}

/// Stamps `meta.received_at` with the context's receive time.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReceivedAtHook;

impl Hook for ReceivedAtHook {
    fn on_before_validate(
        &self,
        record: &mut SubmissionRecord,
        ctx: &RequestContext,
    ) -> anyhow::Result<()> {
        record.meta.insert(
            "received_at".to_string(),
            Value::String(ctx.received_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        Ok(())
    }
}
