//! Store, scoring client and orchestrator wiring

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use playscout_core::Config;
use playscout_db::{
    DocumentStore, InMemoryDocumentStore, InMemoryRetryJobStore, PostgresDocumentStore,
    PostgresRetryJobStore, RetryJobStore,
};
use playscout_scoring::create_analysis_client;
use playscout_worker::{
    AnalysisOrchestrator, BackgroundTaskRegistry, RetryPolicy, RetrySweeper, DEFAULT_SWEEP_BATCH,
};

use crate::state::AppState;

async fn setup_stores(config: &Config) -> Result<(Arc<dyn DocumentStore>, Arc<dyn RetryJobStore>)> {
    match &config.database_url {
        Some(url) => {
            let pool = playscout_db::connect(url, config.db_max_connections)
                .await
                .context("Failed to set up database")?;
            Ok((
                Arc::new(PostgresDocumentStore::new(pool.clone())),
                Arc::new(PostgresRetryJobStore::new(pool)),
            ))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores; records are lost on restart");
            Ok((
                Arc::new(InMemoryDocumentStore::new()),
                Arc::new(InMemoryRetryJobStore::new()),
            ))
        }
    }
}

pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let (store, retry_jobs) = setup_stores(config).await?;
    let client = create_analysis_client(&config.scoring)?;
    let registry = Arc::new(BackgroundTaskRegistry::new());

    let orchestrator = AnalysisOrchestrator::new(
        store,
        client,
        retry_jobs,
        registry,
        RetryPolicy::from_profile(&config.retry),
    )
    .with_analysis_timeout(Duration::from_secs(config.analysis_timeout_seconds));

    Ok(Arc::new(AppState::new(config.clone(), orchestrator)))
}

pub fn start_retry_sweeper(config: &Config, state: &AppState) -> RetrySweeper {
    RetrySweeper::start(
        state.orchestrator.clone(),
        Duration::from_secs(config.retry_sweep_interval_seconds),
        DEFAULT_SWEEP_BATCH,
    )
}
