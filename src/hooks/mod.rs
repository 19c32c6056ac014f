//! Hook module.
//!
//! Provides the hook capability, scoped registration and isolated dispatch,
//! plus stock enrichment hooks (client address, honeypot capture,
//! fingerprint, receive time).

pub mod builtin;
pub mod dispatcher;

pub use builtin::*;
pub use dispatcher::*;
