//! Application layer: drives flows against the subject system.

pub mod batch_runner;
pub mod choice_resolver;
pub mod flow_executor;
pub mod flow_generator;
pub mod snapshot_service;
pub mod subject;
