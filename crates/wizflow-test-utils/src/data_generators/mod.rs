//! Test data generators for the wizard flow harness.
//!
//! This module provides the fixture world served by the in-memory subject and
//! flows tailored to expose specific subject defects.

pub mod flows;
pub mod world;

// Re-export all data generators for easy access
pub use flows::*;
pub use world::World;
