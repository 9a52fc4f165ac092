//! # OmniCRM Connect Service Entry Point

use omnicrm::{config::ConfigLoader, db::init_pool, server::run_server, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from layered env files and variables. A missing
    // or malformed encryption key aborts startup here.
    let config = ConfigLoader::new().load()?;

    telemetry::init_tracing(&config)?;

    tracing::info!(profile = %config.profile, "loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "effective configuration");
    }

    let db = init_pool(&config).await?;

    run_server(config, db).await
}
