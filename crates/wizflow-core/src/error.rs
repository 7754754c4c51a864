use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// How a boundary error was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryErrorKind {
    /// The subject answered with a status of 400 or above
    Rejected,
    /// The subject answered successfully but the body did not match the expected shape
    ContractViolation,
}

/// A request the subject system rejected, or answered with a body the harness could not decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryError {
    pub kind: BoundaryErrorKind,
    pub status: u16,
    pub method: String,
    pub path: String,
    pub message: String,
    #[serde(default)]
    pub errors: Value,
}

impl BoundaryError {
    pub fn rejected(method: &str, path: &str, status: u16, message: String, errors: Value) -> Self {
        Self {
            kind: BoundaryErrorKind::Rejected,
            status,
            method: method.to_string(),
            path: path.to_string(),
            message,
            errors,
        }
    }

    pub fn contract_violation(method: &str, path: &str, status: u16, message: String) -> Self {
        Self {
            kind: BoundaryErrorKind::ContractViolation,
            status,
            method: method.to_string(),
            path: path.to_string(),
            message,
            errors: Value::Null,
        }
    }
}

impl fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BoundaryErrorKind::Rejected => write!(
                f,
                "{} {} rejected with status {}: {}",
                self.method, self.path, self.status, self.message
            ),
            BoundaryErrorKind::ContractViolation => write!(
                f,
                "{} {} returned an unexpected body: {}",
                self.method, self.path, self.message
            ),
        }
    }
}

/// Core error type for the wizard flow harness
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// The subject system rejected a request or broke the response contract
    #[error("Boundary error: {0}")]
    Boundary(BoundaryError),

    /// The request interface itself failed (no response at all)
    #[error("Transport error: {0}")]
    TransportError(String),

    /// An entity the flow needs is missing from the catalog
    #[error("Catalog error: {0}")]
    CatalogError(String),

    /// The randomizer was asked to draw from an empty or invalid range
    #[error("Randomizer error: {0}")]
    RandomizerError(String),

    /// A step could not run because an earlier step did not establish its preconditions
    #[error("Flow execution error: {0}")]
    FlowExecutionError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Short machine-readable name of the variant, used in flow error records.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Boundary(_) => "boundary",
            CoreError::TransportError(_) => "transport",
            CoreError::CatalogError(_) => "catalog",
            CoreError::RandomizerError(_) => "randomizer",
            CoreError::FlowExecutionError(_) => "flow_execution",
            CoreError::SerializationError(_) => "serialization",
            CoreError::ConfigurationError(_) => "configuration",
            CoreError::Other(_) => "other",
        }
    }
}

impl From<BoundaryError> for CoreError {
    fn from(err: BoundaryError) -> Self {
        CoreError::Boundary(err)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
