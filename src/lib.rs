//! FormRelay Core - synchronous form submission pipeline
//!
//! Takes a user-submitted record through enrichment hooks and ordered
//! validators, hands a sanitized projection to an outbound sender, and
//! returns a stable `{ok, code, message, meta}` envelope. The
//! implementation prioritizes:
//!
//! 1. **Isolation** - Hooks can never break a run; every failure becomes a code
//! 2. **Logging** - Every decision point logged with request context
//! 3. **Determinism** - Registration order, stable labels, one send per run
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `pipeline` - Orchestrator, result codes, envelope, config
//! - `hooks` - Scoped hook registry with isolated dispatch, stock hooks
//! - `validation` - Validator registry, outcomes, stock validators
//! - `submission` - Live record and its frozen snapshot
//! - `transport` - Outbound message, renderer, sender contract
//! - `security` - Trusted-proxy client address resolution, CIDR, content scan
//! - `logging` - Structured logging with request context
//!
//! ```no_run
//! use std::sync::Arc;
//! use formrelay_core::{MemorySender, Pipeline, PipelineConfig, SubmissionRecord};
//!
//! let mut pipeline = Pipeline::standard(PipelineConfig::default())?;
//! pipeline.set_sender(Arc::new(MemorySender::new()));
//!
//! let result = pipeline.process(
//!     SubmissionRecord::new()
//!         .with_name("Ada")
//!         .with_email("ada@example.com")
//!         .with_message("Hello"),
//! );
//! assert!(result.ok);
//! # Ok::<(), formrelay_core::ConfigError>(())
//! ```

pub mod error;
pub mod hooks;
pub mod logging;
pub mod pipeline;
pub mod security;
pub mod submission;
pub mod transport;
pub mod validation;

pub use error::ConfigError;
pub use hooks::{Hook, HookRegistry, HookScope, HookSpec};
pub use pipeline::{
    MessageResolver, Pipeline, PipelineConfig, PipelineResult, RequestContext, ERR_NO_SENDER,
    ERR_SEND_FAILED, ERR_UNEXPECTED, ERR_VALIDATION, OK_SENT,
};
pub use security::{TrustPolicy, TrustedProxyResolver};
pub use submission::{BodyValue, ReadOnlySnapshot, SubmissionRecord};
pub use transport::{MemorySender, OutboundMessage, Renderer, SendError, Sender};
pub use validation::{ValidationFailure, ValidationOutcome, Validator, ValidatorRegistry};

/// Initialize the process-wide logger. Repeat calls are no-ops.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .try_init();
}
