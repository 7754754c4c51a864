//! In-memory implementation of ReportStore
//!
//! Primarily intended for tests. All data is lost when the instance is dropped.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    validate_run_id, Report, ReportHash, ReportListing, ReportStore, ReportStoreError,
    ReportStoreResult, StoredReport,
};

#[derive(Debug, Clone, Default)]
pub struct InMemoryReportStore {
    reports: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn save(&self, report: &Report) -> ReportStoreResult<StoredReport> {
        let run_id = report.run_id.to_string();
        let bytes = serde_json::to_vec(report)?;
        let content_hash = ReportHash::of(&bytes);

        let mut store = self.reports.write().await;
        store.insert(run_id.clone(), bytes);

        Ok(StoredReport {
            location: format!("memory:{}", run_id),
            run_id,
            content_hash,
        })
    }

    async fn load(&self, run_id: &str) -> ReportStoreResult<Report> {
        validate_run_id(run_id)?;
        let store = self.reports.read().await;
        let bytes = store
            .get(run_id)
            .ok_or_else(|| ReportStoreError::NotFound(run_id.to_string()))?;
        Ok(serde_json::from_slice(bytes)?)
    }

    async fn list(&self) -> ReportStoreResult<Vec<ReportListing>> {
        let store = self.reports.read().await;
        let mut listings = store
            .values()
            .map(|bytes| serde_json::from_slice::<Report>(bytes).map(|r| ReportListing::from_report(&r)))
            .collect::<Result<Vec<_>, _>>()?;
        listings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(listings)
    }
}
