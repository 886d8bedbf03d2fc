//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use playscout_core::Config;
use playscout_infra::telemetry::{init_telemetry, LogFormat};
use playscout_worker::RetrySweeper;
use std::sync::Arc;

/// Everything `start_server` needs to serve and later shut down.
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub sweeper: RetrySweeper,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    config
        .validate()
        .context("Configuration validation failed")?;

    init_telemetry("playscout-api", &config.environment, LogFormat::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        max_retries = config.retry.max_retries,
        base_delay_seconds = config.retry.base_delay_seconds,
        max_delay_seconds = config.retry.max_delay_seconds,
        "Configuration loaded and validated successfully"
    );

    let state = services::initialize_services(&config).await?;
    let sweeper = services::start_retry_sweeper(&config, &state);
    let router = routes::setup_routes(state.clone());

    Ok(App {
        state,
        router,
        sweeper,
    })
}
