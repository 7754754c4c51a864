//! Configuration for the wizard flow runner
//!
//! Values come from an optional `wizflow.toml` in the working directory, then
//! `WIZFLOW_*` environment variables (`WIZFLOW_REPORT_DIR`, `WIZFLOW_CONCURRENCY`,
//! ...). Command line flags are applied on top by the caller.

use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use wizflow_core::HarnessConfig;
use wizflow_monitoring::MonitoringConfig;

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Directory reports are written to and listed from
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Log filter; `RUST_LOG` still wins when set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub json_logs: bool,

    /// Flows executed at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub always_prepared_classes: Option<Vec<String>>,

    #[serde(default)]
    pub subclass_level: Option<u32>,
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("wizard-flow-reports")
}

fn default_log_filter() -> String {
    MonitoringConfig::default().log_filter
}

fn default_concurrency() -> usize {
    1
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            report_dir: default_report_dir(),
            log_filter: default_log_filter(),
            json_logs: false,
            concurrency: default_concurrency(),
            always_prepared_classes: None,
            subclass_level: None,
        }
    }
}

impl CliConfig {
    /// Load from `wizflow.toml` (if present) and the process environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::from_sources(Some(Path::new("wizflow.toml")), None)
    }

    /// Load from an optional file and an explicit environment map.
    ///
    /// `env: None` reads the process environment.
    pub fn from_sources(
        file: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
        builder = builder.add_source(environment().source(env));

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config.sanitized())
    }

    /// Parse TOML text, then apply `env` on top
    pub fn from_toml(toml: &str, env: Map<String, String>) -> Result<Self, config::ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .add_source(environment().source(Some(env)))
            .build()?
            .try_deserialize()?;
        Ok(config.sanitized())
    }

    fn sanitized(mut self) -> Self {
        if self.concurrency == 0 {
            warn!("Invalid WIZFLOW_CONCURRENCY value: 0");
            self.concurrency = default_concurrency();
        }
        if self.subclass_level == Some(0) {
            warn!("Invalid WIZFLOW_SUBCLASS_LEVEL value: 0");
            self.subclass_level = None;
        }
        if self.log_filter.trim().is_empty() {
            warn!("Empty WIZFLOW_LOG_FILTER, using default");
            self.log_filter = default_log_filter();
        }
        info!(report_dir = %self.report_dir.display(), concurrency = self.concurrency, "Loaded configuration");
        self
    }

    pub fn monitoring(&self) -> MonitoringConfig {
        MonitoringConfig {
            log_filter: self.log_filter.clone(),
            enable_json_logging: self.json_logs,
            ..MonitoringConfig::default()
        }
    }

    /// Harness tunables, with unset values left at their defaults
    pub fn harness(&self) -> HarnessConfig {
        let mut harness = HarnessConfig::default();
        if let Some(classes) = &self.always_prepared_classes {
            harness.always_prepared_classes = classes.clone();
        }
        if let Some(level) = self.subclass_level {
            harness.subclass_level = level;
        }
        harness
    }
}

fn environment() -> Environment {
    Environment::with_prefix("WIZFLOW")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("always_prepared_classes")
}
