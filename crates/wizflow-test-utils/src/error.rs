use thiserror::Error;

/// Error types for the test utilities
#[derive(Debug, Error)]
pub enum TestUtilsError {
    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A fault name that does not match any known fault
    #[error("Unknown fault: {0}")]
    UnknownFault(String),

    /// An assertion helper found something other than what it expected
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    /// Test setup failed
    #[error("Test setup failed: {0}")]
    TestSetupFailed(String),
}
