//! Hook registry and dispatch.
//!
//! Hooks are partitioned at configuration time into four scoped buckets
//! (global-before, per-label-before, global-after, per-label-after) plus a
//! flat list used for the unconditional after-send and on-failure phases.
//!
//! Every call into a hook goes through [`isolated`]. That wrapper is the
//! fault-isolation boundary between enrichment code and the primary flow:
//! a hook that returns an error or panics is ignored and the pipeline
//! carries on as if it had succeeded.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::error::ConfigError;
use crate::pipeline::context::RequestContext;
use crate::submission::SubmissionRecord;
use crate::transport::message::{OutboundMessage, SendError};

/// Enrichment/observer callbacks. Every method defaults to a no-op.
pub trait Hook: Send + Sync {
    /// Runs before validation (globally, or before the scoped validators).
    fn on_before_validate(
        &self,
        _record: &mut SubmissionRecord,
        _ctx: &RequestContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after validation. `label` is `None` for the global phase, where
    /// `results` is the whole `meta.validators` map; otherwise `results` is
    /// that label's entry list.
    fn on_after_validate(
        &self,
        _record: &mut SubmissionRecord,
        _label: Option<&str>,
        _results: &Value,
        _ctx: &RequestContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_after_send(
        &self,
        _record: &SubmissionRecord,
        _message: &OutboundMessage,
        _ctx: &RequestContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_send_failure(
        &self,
        _record: &SubmissionRecord,
        _error: &SendError,
        _ctx: &RequestContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Which validation phase a hook participates in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HookScope {
    #[default]
    Global,
    Labels(Vec<String>),
}

impl HookScope {
    pub fn labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HookScope::Labels(labels.into_iter().map(Into::into).collect())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            HookScope::Global => Ok(()),
            HookScope::Labels(labels) if labels.is_empty() => Err(ConfigError::InvalidHookScope(
                "label scope names no validators".to_string(),
            )),
            HookScope::Labels(labels) if labels.iter().any(|l| l.trim().is_empty()) => Err(
                ConfigError::InvalidHookScope("label scope contains a blank label".to_string()),
            ),
            HookScope::Labels(_) => Ok(()),
        }
    }
}

/// A hook plus its before/after scopes. Defaults to global for both.
#[derive(Clone)]
pub struct HookSpec {
    pub hook: Arc<dyn Hook>,
    pub before: HookScope,
    pub after: HookScope,
}

impl HookSpec {
    pub fn new<H: Hook + 'static>(hook: H) -> Self {
        Self::from_arc(Arc::new(hook))
    }

    pub fn from_arc(hook: Arc<dyn Hook>) -> Self {
        Self {
            hook,
            before: HookScope::Global,
            after: HookScope::Global,
        }
    }

    pub fn before(mut self, scope: HookScope) -> Self {
        self.before = scope;
        self
    }

    pub fn after(mut self, scope: HookScope) -> Self {
        self.after = scope;
        self
    }
}

impl fmt::Debug for HookSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSpec")
            .field("before", &self.before)
            .field("after", &self.after)
            .finish()
    }
}

/// Invoke a hook callback, discarding whatever error or panic it raises.
fn isolated<F>(call: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    let _ = panic::catch_unwind(AssertUnwindSafe(call));
}

type Bucket = Vec<Arc<dyn Hook>>;

#[derive(Clone, Default)]
pub struct HookRegistry {
    global_before: Bucket,
    label_before: HashMap<String, Bucket>,
    global_after: Bucket,
    label_after: HashMap<String, Bucket>,
    all: Bucket,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole hook set.
    ///
    /// Buckets are built on the side and swapped in only once every spec
    /// has been accepted, so a rejected spec leaves the old set untouched.
    pub fn configure(&mut self, specs: Vec<HookSpec>) -> Result<(), ConfigError> {
        let mut next = HookRegistry::new();

        for spec in specs {
            spec.before.validate()?;
            spec.after.validate()?;

            match &spec.before {
                HookScope::Global => next.global_before.push(Arc::clone(&spec.hook)),
                HookScope::Labels(labels) => {
                    for label in labels {
                        next.label_before
                            .entry(label.trim().to_string())
                            .or_default()
                            .push(Arc::clone(&spec.hook));
                    }
                }
            }

            match &spec.after {
                HookScope::Global => next.global_after.push(Arc::clone(&spec.hook)),
                HookScope::Labels(labels) => {
                    for label in labels {
                        next.label_after
                            .entry(label.trim().to_string())
                            .or_default()
                            .push(Arc::clone(&spec.hook));
                    }
                }
            }

            next.all.push(spec.hook);
        }

        log::debug!(
            "HOOKS_CONFIGURED total={} global_before={} global_after={} scoped_before={} scoped_after={}",
            next.all.len(),
            next.global_before.len(),
            next.global_after.len(),
            next.label_before.len(),
            next.label_after.len()
        );

        *self = next;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn before_global(&self, record: &mut SubmissionRecord, ctx: &RequestContext) {
        for hook in &self.global_before {
            isolated(|| hook.on_before_validate(record, ctx));
        }
    }

    pub fn before_label(&self, label: &str, record: &mut SubmissionRecord, ctx: &RequestContext) {
        for hook in self.label_before.get(label).into_iter().flatten() {
            isolated(|| hook.on_before_validate(record, ctx));
        }
    }

    pub fn after_label(
        &self,
        label: &str,
        record: &mut SubmissionRecord,
        results: &Value,
        ctx: &RequestContext,
    ) {
        for hook in self.label_after.get(label).into_iter().flatten() {
            isolated(|| hook.on_after_validate(record, Some(label), results, ctx));
        }
    }

    pub fn after_global(
        &self,
        record: &mut SubmissionRecord,
        results: &Value,
        ctx: &RequestContext,
    ) {
        for hook in &self.global_after {
            isolated(|| hook.on_after_validate(record, None, results, ctx));
        }
    }

    pub fn after_send(
        &self,
        record: &SubmissionRecord,
        message: &OutboundMessage,
        ctx: &RequestContext,
    ) {
        for hook in &self.all {
            isolated(|| hook.on_after_send(record, message, ctx));
        }
    }

    pub fn send_failure(&self, record: &SubmissionRecord, error: &SendError, ctx: &RequestContext) {
        for hook in &self.all {
            isolated(|| hook.on_send_failure(record, error, ctx));
        }
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("all", &self.all.len())
            .field("global_before", &self.global_before.len())
            .field("label_before", &self.label_before.keys().collect::<Vec<_>>())
            .field("global_after", &self.global_after.len())
            .field("label_after", &self.label_after.keys().collect::<Vec<_>>())
            .finish()
    }
}
