//! Structured logging with request context.
//!
//! Provides logging macros and utilities that include the request_id (and,
//! inside the validator loop, the validator label) in every log message, plus
//! the `Logger` collaborator the pipeline reports outcomes through.

pub mod structured;

pub use structured::*;
