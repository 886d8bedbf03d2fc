//! Playscout Worker Library
//!
//! The asynchronous analysis pipeline: the orchestrator state machine, its
//! backoff policy, the registry that tracks background units, and the sweeper
//! that dispatches persisted retries.

pub mod orchestrator;
pub mod registry;
pub mod retry_policy;
pub mod sweeper;

pub use orchestrator::{AnalysisOrchestrator, RetryDecision, DEFAULT_ANALYSIS_TIMEOUT};
pub use registry::{BackgroundTaskRegistry, BackgroundTasks, UnitOfWork};
pub use retry_policy::RetryPolicy;
pub use sweeper::{RetrySweeper, DEFAULT_SWEEP_BATCH};
