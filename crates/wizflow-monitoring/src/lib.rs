//! Logging and metrics for wizard flow runs.

use serde::{Deserialize, Serialize};
use tracing::info;

pub mod logging;
pub mod metrics;

pub use crate::metrics::HarnessMetrics;

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to log output
    pub service_name: String,
    /// Log level filter (e.g., "info,wizflow_core=debug"); `RUST_LOG` wins when set
    pub log_filter: String,
    /// JSON lines instead of the pretty format
    pub enable_json_logging: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "wizard-flow".to_string(),
            log_filter: "warn,wizflow_cli=info".to_string(),
            enable_json_logging: false,
        }
    }
}

/// Initialize logging for the process
pub fn init(config: &MonitoringConfig) -> anyhow::Result<()> {
    logging::init_logging(config)?;
    info!(service_name = %config.service_name, "Monitoring initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MonitoringConfig::default();
        assert_eq!(config.service_name, "wizard-flow");
        assert!(!config.enable_json_logging);
    }
}
