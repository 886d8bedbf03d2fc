//! Test helpers: build AppState and router over in-memory stores.
//!
//! Run with `cargo test -p playscout-api`. No database is needed; the scoring
//! client is scripted so outcomes are deterministic.

use axum_test::TestServer;
use std::sync::Arc;
use std::time::Duration;

use playscout_api::setup::routes;
use playscout_api::{constants, AppState};
use playscout_core::models::{AnalysisState, MediaId, MediaRecord, MediaType};
use playscout_core::Config;
use playscout_db::{DocumentStore, InMemoryDocumentStore, InMemoryRetryJobStore};
use playscout_scoring::test_helpers::ScriptedAnalysisClient;
use playscout_worker::{AnalysisOrchestrator, BackgroundTaskRegistry, BackgroundTasks, RetryPolicy};

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

pub struct TestApp {
    pub server: TestServer,
    pub store: InMemoryDocumentStore,
    pub registry: BackgroundTaskRegistry,
    pub client: Arc<ScriptedAnalysisClient>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Insert a record with a prepared analysis state.
    pub async fn seed(&self, id: &str, state: AnalysisState) -> MediaId {
        let media_id = MediaId::new(id);
        let mut record = MediaRecord::new(
            media_id.clone(),
            format!("https://cdn.example.com/{}.mp4", id),
            MediaType::Video,
            state.max_retries,
        );
        record.ai_analysis = state;
        self.store.insert(&record).await.unwrap();
        media_id
    }

    /// Wait until no analysis run or retry waiter is left.
    pub async fn settle(&self) {
        for _ in 0..500 {
            if self.registry.count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background tasks did not settle");
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "ENVIRONMENT" => Some("testing".to_string()),
        _ => None,
    })
    .expect("Failed to build test config")
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(ScriptedAnalysisClient::succeeding()).await
}

pub async fn setup_test_app_with(client: ScriptedAnalysisClient) -> TestApp {
    let config = test_config();
    let store = InMemoryDocumentStore::new();
    let registry = BackgroundTaskRegistry::new();
    let client = Arc::new(client);

    let orchestrator = AnalysisOrchestrator::new(
        Arc::new(store.clone()),
        client.clone(),
        Arc::new(InMemoryRetryJobStore::new()),
        Arc::new(registry.clone()),
        RetryPolicy::from_profile(&config.retry),
    );
    let state = Arc::new(AppState::new(config, orchestrator));
    let server = TestServer::new(routes::setup_routes(state)).expect("Failed to start test server");

    TestApp {
        server,
        store,
        registry,
        client,
    }
}
