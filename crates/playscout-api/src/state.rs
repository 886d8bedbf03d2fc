//! Application state shared by all handlers.

use std::sync::Arc;

use playscout_core::Config;
use playscout_db::DocumentStore;
use playscout_worker::AnalysisOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub orchestrator: AnalysisOrchestrator,
}

impl AppState {
    pub fn new(config: Config, orchestrator: AnalysisOrchestrator) -> Self {
        Self {
            config,
            store: orchestrator.store().clone(),
            orchestrator,
        }
    }

    /// Background units still running (analysis runs and retry waiters).
    pub fn background_tasks(&self) -> usize {
        self.orchestrator.tasks().count()
    }
}
