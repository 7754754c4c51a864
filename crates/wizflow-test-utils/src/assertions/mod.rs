//! Assertion utilities for flow results.
//!
//! Helpers return `Result` rather than panicking, so tests can report every
//! mismatch with the full context of the failed flow.

mod flow_result;

// Re-export all assertion helpers for easy access
pub use flow_result::*;
