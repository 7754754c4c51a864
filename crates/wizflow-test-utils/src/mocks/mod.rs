//! Mock implementations of the subject interface.
//!
//! Mocks give full control over every response, for tests that need a subject
//! misbehaving in ways the in-memory subject does not model.

pub mod subject_client;

// Re-export all mocks and their creator functions for easy access
pub use subject_client::*;
