//! Run metrics, emitted both as `metrics` counters/histograms and as tracing events.
//!
//! Without an installed recorder the `metrics` calls are no-ops.

use tracing::info;
use wizflow_core::{FlowResult, StepOutcome};

pub struct HarnessMetrics;

impl HarnessMetrics {
    /// Record one finished flow
    pub fn record_flow(result: &FlowResult) {
        let status = result.status().to_string();
        let duration_ms = result.duration_ms().unwrap_or(0) as f64;

        ::metrics::counter!("wizflow_flows_total", 1, "status" => status.clone());
        ::metrics::histogram!("wizflow_flow_duration_ms", duration_ms);
        for pattern in result.failure_patterns() {
            ::metrics::counter!("wizflow_failures_total", 1, "pattern" => pattern);
        }
        let skipped = result
            .steps()
            .iter()
            .filter(|s| s.outcome == StepOutcome::Skipped)
            .count();

        info!(
            iteration = result.iteration(),
            status = %status,
            steps = result.steps().len(),
            skipped,
            failures = result.failures().len(),
            duration_ms,
            "Flow Execution"
        );
    }

    /// Record a finished batch
    pub fn record_batch(total: usize, passed: usize, failed: usize, errors: usize, duration_ms: f64) {
        ::metrics::histogram!("wizflow_batch_duration_ms", duration_ms);
        ::metrics::gauge!("wizflow_batch_pass_ratio", ratio(passed, total));
        info!(total, passed, failed, errors, duration_ms, "Batch Execution");
    }
}

fn ratio(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64
    }
}
