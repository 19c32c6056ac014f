//! Pipeline orchestration module.
//!
//! Runs a submission through hooks, validators and the transport:
//! - Request context seeded into `meta`
//! - Stable result codes and their messages
//! - The `{ok, code, message, meta}` result envelope
//! - JSON configuration
//! - The orchestrator itself

pub mod codes;
pub mod config;
pub mod context;
pub mod envelope;
pub mod orchestrator;

pub use codes::*;
pub use config::*;
pub use context::*;
pub use envelope::*;
pub use orchestrator::*;
