//! Wizflow Report
//!
//! Turns the results of a batch into a [`Report`] and persists reports so earlier
//! runs can be listed and inspected. The [`ReportStore`] trait is the storage
//! contract; [`FileReportStore`] writes one JSON document per run and
//! [`InMemoryReportStore`] keeps everything in memory for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Debug, Display};
use thiserror::Error;

pub mod file;
pub mod memory;
pub mod report;

pub use file::FileReportStore;
pub use memory::InMemoryReportStore;
pub use report::{Report, ReportGenerator, ReportSummary, RunOptions, SubjectRecord};

/// Content hash of a stored report, `"sha256:<hex_digest>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportHash(String);

impl ReportHash {
    /// Hash of the serialized report bytes
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ReportHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a report ended up after [`ReportStore::save`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReport {
    pub run_id: String,
    /// File path, or `memory:<run_id>` for the in-memory store
    pub location: String,
    pub content_hash: ReportHash,
}

/// One line of a report listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportListing {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub seed: u64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub pass_rate: f64,
}

impl ReportListing {
    pub fn from_report(report: &Report) -> Self {
        Self {
            run_id: report.run_id.to_string(),
            timestamp: report.timestamp,
            seed: report.seed,
            total: report.summary.total,
            passed: report.summary.passed,
            failed: report.summary.failed,
            errors: report.summary.errors,
            pass_rate: report.summary.pass_rate,
        }
    }
}

/// Errors that can occur during report store operations
#[derive(Error, Debug)]
pub enum ReportStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Report not found: {0}")]
    NotFound(String),

    #[error("Invalid run id: {0}")]
    InvalidRunId(String),
}

pub type ReportStoreResult<T> = Result<T, ReportStoreError>;

/// Run ids are UUIDs; anything else could escape the report directory.
pub fn validate_run_id(run_id: &str) -> ReportStoreResult<()> {
    let valid = !run_id.is_empty()
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ReportStoreError::InvalidRunId(run_id.to_string()))
    }
}

/// Trait defining the contract for report persistence
#[async_trait]
pub trait ReportStore: Send + Sync + Debug {
    /// Persist a report under its run id, replacing any earlier copy
    async fn save(&self, report: &Report) -> ReportStoreResult<StoredReport>;

    async fn load(&self, run_id: &str) -> ReportStoreResult<Report>;

    /// Saved reports, newest first
    async fn list(&self) -> ReportStoreResult<Vec<ReportListing>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_has_expected_shape() {
        let hash = ReportHash::of(b"{}");
        assert!(hash.as_str().starts_with("sha256:"));
        assert_eq!(hash.as_str().len(), 71);
        assert_eq!(hash, ReportHash::of(b"{}"));
        assert_ne!(hash, ReportHash::of(b"[]"));
    }

    #[test]
    fn run_ids_cannot_traverse() {
        assert!(validate_run_id("0b6f7c1e-4a57-4a7e-9d55-0c5d3f0f8e21").is_ok());
        assert!(validate_run_id("../etc/passwd").is_err());
        assert!(validate_run_id("").is_err());
    }
}
