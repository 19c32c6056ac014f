//! The result envelope returned by every pipeline run.

use serde::Serialize;
use serde_json::{Map, Value};

use super::codes::{MessageResolver, OK_SENT};

/// `{ok, code, message, meta}`. `ok` is true iff `code` is `OK_SENT`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub ok: bool,
    pub code: String,
    pub message: String,
    pub meta: Map<String, Value>,
}

impl PipelineResult {
    /// Assemble an envelope, resolving `code` to text through `resolver`.
    ///
    /// # Arguments
    /// * `code` - Final result code
    /// * `context` - Values for message placeholders (e.g. `field`)
    /// * `meta` - Aggregated diagnostics from the run
    pub fn build(
        code: &str,
        context: &Map<String, Value>,
        meta: Map<String, Value>,
        resolver: &dyn MessageResolver,
    ) -> Self {
        Self {
            ok: code == OK_SENT,
            code: code.to_string(),
            message: resolver.resolve(code, context),
            meta,
        }
    }

    /// Entries recorded for one validator label, if it ran.
    pub fn validator_entries(&self, label: &str) -> Option<&Vec<Value>> {
        self.meta
            .get(super::orchestrator::VALIDATORS_KEY)?
            .get(label)?
            .as_array()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
