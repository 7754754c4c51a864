//! Testing utilities for the wizard flow harness.
//!
//! This crate provides the reference subject the harness is exercised against,
//! including an in-memory implementation of the request interface, switchable
//! fault injection, mocks, assertion utilities, and the fixture world the
//! reference subject serves.

pub mod assertions;
pub mod data_generators;
pub mod error;
pub mod faults;
pub mod implementations;
pub mod mocks;

/// Re-export commonly used types for convenience
pub use mockall;

pub use data_generators::World;
pub use error::TestUtilsError;
pub use faults::{Fault, FaultSet};
pub use implementations::InMemorySubject;
pub use mocks::MockSubjectClient;
