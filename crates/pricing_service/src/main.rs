//! MHD pricing service entry point

use anyhow::{Context, Result};
use mhd_pricing_service::config::ENV_CONFIG;
use mhd_pricing_service::{start_server, AppState, PredictionService, ServiceConfig, ServingContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var(ENV_CONFIG).ok().map(PathBuf::from);
    let config = ServiceConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {e}"))?;

    info!("Starting MHD Pricing Service v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Configuration loaded from {}", path.display());
    }

    let context = ServingContext::load(&config).context("Failed to load serving state")?;
    if !context.is_model_loaded() {
        warn!("Running in heuristic mode");
    }

    let service = PredictionService::new(Arc::new(context), config.band_fraction);
    let state = Arc::new(AppState::new(service));
    start_server(state, config.socket_addr()?).await
}
