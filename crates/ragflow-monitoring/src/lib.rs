//! Logging setup for the RAGFlow platform.

use serde::{Deserialize, Serialize};
use tracing::info;

pub mod logging;

pub use logging::{build_filter, init_logging};

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Log level filter (e.g., "info,ragflow_core=debug"). `RUST_LOG` wins when set.
    pub log_filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "ragflow".to_string(),
            log_filter: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Initialize the global tracing subscriber
pub fn init(config: MonitoringConfig) -> anyhow::Result<()> {
    init_logging(&config)?;
    info!(service_name = %config.service_name, "Monitoring initialized");
    Ok(())
}

/// Shutdown hook for the monitoring system
pub fn shutdown() {
    info!("Shutting down monitoring system");
}
