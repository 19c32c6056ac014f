//! Security module.
//!
//! Provides trusted-proxy client address resolution, CIDR matching and
//! threat scanning for submitted content.

pub mod cidr;
pub mod proxy;
pub mod sanitizer;

pub use cidr::*;
pub use proxy::*;
pub use sanitizer::*;
