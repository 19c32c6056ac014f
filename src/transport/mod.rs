//! Outbound transport boundary.
//!
//! - `message` - the rendered message and the `Sender` contract
//! - `render` - HTML/text rendering of the sanitized projection
//! - `senders` - built-in senders and fallback construction from config

pub mod message;
pub mod render;
pub mod senders;

pub use message::*;
pub use render::*;
pub use senders::*;
