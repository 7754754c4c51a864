//! File-backed ReportStore: one pretty-printed JSON document per run.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{
    validate_run_id, Report, ReportHash, ReportListing, ReportStore, ReportStoreError,
    ReportStoreResult, StoredReport,
};

#[derive(Debug, Clone)]
pub struct FileReportStore {
    dir: PathBuf,
}

impl FileReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn report_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", run_id))
    }
}

#[async_trait]
impl ReportStore for FileReportStore {
    async fn save(&self, report: &Report) -> ReportStoreResult<StoredReport> {
        let run_id = report.run_id.to_string();
        tokio::fs::create_dir_all(&self.dir).await?;

        let bytes = serde_json::to_vec_pretty(report)?;
        let content_hash = ReportHash::of(&bytes);
        let path = self.report_path(&run_id);
        tokio::fs::write(&path, &bytes).await?;

        info!(run_id = %run_id, path = %path.display(), hash = %content_hash, "Saved report");
        Ok(StoredReport {
            run_id,
            location: path.display().to_string(),
            content_hash,
        })
    }

    async fn load(&self, run_id: &str) -> ReportStoreResult<Report> {
        validate_run_id(run_id)?;
        let path = self.report_path(run_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReportStoreError::NotFound(run_id.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn list(&self) -> ReportStoreResult<Vec<ReportListing>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut listings = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Report>(&bytes) {
                Ok(report) => listings.push(ReportListing::from_report(&report)),
                Err(err) => warn!(path = %path.display(), error = %err, "Skipping unreadable report"),
            }
        }

        listings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        debug!(count = listings.len(), dir = %self.dir.display(), "Listed reports");
        Ok(listings)
    }
}
