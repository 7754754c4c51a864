//!
//! Wizflow Core - flow fuzzing harness for the character-creation wizard
//!
//! Generates wizard flows (optionally with mid-flow switches of race, class,
//! background or equipment mode), executes them against a subject system through
//! a black-box request interface, snapshots state around each step and checks the
//! cascade invariants that must hold after every change.

#![forbid(unsafe_code)]

/// Domain layer - flows, snapshots, catalog and subject payloads
pub mod domain;

/// Application services - generator, executor, resolver, batch runner
pub mod application;

/// Invariant checks run after steps
pub mod validators;

/// Harness tunables
pub mod config;

/// Request/response types of the subject boundary
pub mod types;

/// Error types
pub mod error;

#[cfg(test)]
mod test_support;

pub use application::batch_runner::{iteration_seed, BatchRunner};
pub use application::choice_resolver::{ChoiceResolver, SweepOutcome};
pub use application::flow_executor::FlowExecutor;
pub use application::flow_generator::{FlowGenerator, FlowKind, InsertRange};
pub use application::snapshot_service::SnapshotService;
pub use application::subject::{SubjectApi, SubjectClient};
pub use config::HarnessConfig;
pub use domain::catalog::Catalog;
pub use domain::context::{EquipmentMode, ExecutionContext};
pub use domain::flow_result::{
    FailureRecord, FlowErrorRecord, FlowResult, FlowState, FlowStatus, StepOutcome, StepRecord,
};
pub use domain::flow_step::{ClassType, Flow, FlowStep, StepAction};
pub use domain::randomizer::Randomizer;
pub use domain::snapshot::StateSnapshot;
pub use domain::validation::ValidationResult;
pub use error::{BoundaryError, BoundaryErrorKind, CoreError, CoreResult};
pub use types::{Method, SubjectRequest, SubjectResponse};
