use anyhow::{Context, Result};
use ragflow_monitoring::MonitoringConfig;
use ragflow_server::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    // Load configuration from environment variables
    let config = ServerConfig::load();

    ragflow_monitoring::init(MonitoringConfig {
        service_name: "ragflow-server".to_string(),
        log_filter: config.log_level.clone(),
        json_logs: config.log_json,
    })
    .context("Failed to initialize monitoring")?;

    ragflow_server::run(config).await.context("Server error")?;

    ragflow_monitoring::shutdown();
    Ok(())
}
