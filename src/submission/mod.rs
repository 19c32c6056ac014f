//! Submission data model.
//!
//! - `record` - the live, mutable submission and its render projection
//! - `snapshot` - the frozen copy validators run against

pub mod record;
pub mod snapshot;

pub use record::*;
pub use snapshot::*;
