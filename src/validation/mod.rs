//! Validation module.
//!
//! Provides the validator capability and its ordered registry:
//! - Outcomes and the records stored under `meta.validators`
//! - Label-keyed registration with deterministic synthetic labels
//! - Stock validators (required, email, length, honeypot, content safety)

pub mod builtin;
pub mod outcome;
pub mod registry;

pub use builtin::*;
pub use outcome::*;
pub use registry::*;
