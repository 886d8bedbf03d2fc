//! Analysis orchestrator
//!
//! Drives the `ai_analysis` state machine of a media record:
//!
//! ```text
//! pending ──analyze──> processing ──ok──> completed
//!                          │
//!                          ├─fail, budget left──> retrying ──delay──> processing
//!                          └─fail, budget spent─> failed ──manual retry──> pending
//! ```
//!
//! Every transition is one guarded partial update, so two runs for the same
//! record cannot both enter `processing`. A run's own writes are also guarded
//! on the `retry_count` it claimed with, so a run whose claim was recovered
//! by a manual retry cannot overwrite its successor. Runs and retry waiters execute as
//! units of the injected [`BackgroundTasks`]; scheduled retries are also
//! persisted as [`RetryJob`]s so the sweeper can dispatch them after a restart.

use anyhow::{anyhow, Context};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use futures::FutureExt;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use playscout_core::models::{
    fields, AnalysisResult, AnalysisState, AnalysisStatus, MediaId, RetryJob,
};
use playscout_core::AppError;
use playscout_db::{DocumentStore, PartialUpdate, RetryJobStore, UpdateOutcome};
use playscout_scoring::AnalysisClient;

use crate::registry::{BackgroundTasks, UnitOfWork};
use crate::retry_policy::RetryPolicy;

pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(30);

/// Re-reads allowed when a manual retry races another update.
const MANUAL_RETRY_ATTEMPTS: usize = 3;

/// What started an analysis run. Decides which statuses the run may claim from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOrigin {
    /// Upload or explicit analyze request.
    Trigger,
    ManualRetry,
    ScheduledRetry,
}

impl RunOrigin {
    fn accepted_from(self) -> &'static [AnalysisStatus] {
        match self {
            RunOrigin::Trigger => &[
                AnalysisStatus::Pending,
                AnalysisStatus::Retrying,
                AnalysisStatus::Completed,
            ],
            RunOrigin::ManualRetry => &[AnalysisStatus::Pending],
            RunOrigin::ScheduledRetry => &[AnalysisStatus::Retrying],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            RunOrigin::Trigger => "analyze",
            RunOrigin::ManualRetry => "manual-retry",
            RunOrigin::ScheduledRetry => "scheduled-retry",
        }
    }
}

/// Answer to a manual retry request. Only `Accepted` changes the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Accepted { retry_count: u32 },
    BudgetExhausted { retry_count: u32, max_retries: u32 },
    NotRetryable { status: AnalysisStatus },
    NotFound,
}

#[derive(Clone)]
pub struct AnalysisOrchestrator {
    store: Arc<dyn DocumentStore>,
    client: Arc<dyn AnalysisClient>,
    retry_jobs: Arc<dyn RetryJobStore>,
    tasks: Arc<dyn BackgroundTasks>,
    policy: RetryPolicy,
    analysis_timeout: Duration,
}

impl AnalysisOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        client: Arc<dyn AnalysisClient>,
        retry_jobs: Arc<dyn RetryJobStore>,
        tasks: Arc<dyn BackgroundTasks>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            client,
            retry_jobs,
            tasks,
            policy,
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }

    /// Upper bound on one scoring call. Elapsing counts as a transient failure.
    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn tasks(&self) -> &Arc<dyn BackgroundTasks> {
        &self.tasks
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Start an analysis run in the background. Returns false when the task
    /// registry is draining and the run was not started.
    pub fn analyze(&self, media_id: MediaId) -> bool {
        self.spawn_run(media_id, RunOrigin::Trigger)
    }

    /// Reset a failed record to a fresh pending attempt and start it.
    ///
    /// Spends one unit of the retry budget shared with automatic retries.
    /// A record stuck in `processing` longer than the analysis timeout (its
    /// run was drained or the process died) is recovered the same way.
    #[tracing::instrument(skip_all, fields(media_id = %media_id))]
    pub async fn retry(&self, media_id: &MediaId) -> Result<RetryDecision, AppError> {
        for _ in 0..MANUAL_RETRY_ATTEMPTS {
            let Some(record) = self.store.get(media_id).await? else {
                return Ok(RetryDecision::NotFound);
            };
            let state = &record.ai_analysis;
            let stale_claim = self.is_stale_claim(state, Utc::now());

            if !state.status.accepts_manual_retry() && !stale_claim {
                return Ok(RetryDecision::NotRetryable {
                    status: state.status,
                });
            }
            if !state.can_retry() {
                tracing::info!(
                    retry_count = state.retry_count,
                    max_retries = state.max_retries,
                    "Manual retry rejected, retry budget exhausted"
                );
                if stale_claim {
                    self.close_stale_claim(media_id, state.retry_count).await?;
                }
                return Ok(RetryDecision::BudgetExhausted {
                    retry_count: state.retry_count,
                    max_retries: state.max_retries,
                });
            }

            let retry_count = state.retry_count + 1;
            let baseline = serde_json::to_value(AnalysisState::reset_for_retry(
                retry_count,
                state.max_retries,
            ))?;
            let reset = PartialUpdate::new()
                .set(fields::AI_ANALYSIS, baseline)
                .when_status_in(&[state.status])
                .guard(fields::RETRY_COUNT, [state.retry_count]);

            match self.store.update(media_id, &reset).await? {
                UpdateOutcome::Applied => {
                    tracing::info!(
                        retry_count,
                        max_retries = state.max_retries,
                        recovered_claim = stale_claim,
                        "Manual retry accepted"
                    );
                    self.spawn_run(media_id.clone(), RunOrigin::ManualRetry);
                    return Ok(RetryDecision::Accepted { retry_count });
                }
                UpdateOutcome::NotFound => return Ok(RetryDecision::NotFound),
                UpdateOutcome::Rejected { current } => {
                    tracing::debug!(current = %current, "Record changed during manual retry, re-reading");
                }
            }
        }

        Err(AppError::Internal(format!(
            "Manual retry for {} kept conflicting with concurrent updates",
            media_id
        )))
    }

    /// A `processing` claim older than the analysis timeout has no live run
    /// behind it: the scoring call of any live run would have timed out.
    fn is_stale_claim(&self, state: &AnalysisState, now: DateTime<Utc>) -> bool {
        if state.status != AnalysisStatus::Processing {
            return false;
        }
        let timeout = TimeDelta::from_std(self.analysis_timeout).unwrap_or(TimeDelta::MAX);
        match state.analysis_started_at {
            Some(started_at) => now.signed_duration_since(started_at) > timeout,
            None => true,
        }
    }

    /// Close out an abandoned claim whose budget is spent, so it ends terminal.
    async fn close_stale_claim(&self, media_id: &MediaId, retry_count: u32) -> Result<(), AppError> {
        let mut update = PartialUpdate::new()
            .set(fields::STATUS, AnalysisStatus::Failed.as_str())
            .set(fields::ERROR_MESSAGE, "analysis interrupted before completion")
            .clear(fields::NEXT_RETRY_AT);
        for path in fields::RESULT_FIELDS {
            update = update.clear(path);
        }
        let update = update
            .when_status_in(&[AnalysisStatus::Processing])
            .guard(fields::RETRY_COUNT, [retry_count]);

        if let UpdateOutcome::Applied = self.store.update(media_id, &update).await? {
            tracing::warn!(retry_count, "Abandoned analysis closed as failed");
        }
        Ok(())
    }

    /// Dispatch persisted retry jobs whose `run_at` has passed. Each job is
    /// claimed before its run starts, so a job is analysed at most once even
    /// when its in-process waiter fires at the same time.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<usize, AppError> {
        let due = self.retry_jobs.due(now, limit).await?;
        let mut dispatched = 0;
        for job in due {
            let label = format!("retry-sweep:{}", job.media_id);
            let unit = waiter_unit(self.clone(), job.media_id, Some(job.id), Duration::ZERO);
            if !self.tasks.spawn(&label, unit) {
                break;
            }
            dispatched += 1;
        }
        if dispatched > 0 {
            tracing::info!(dispatched, "Dispatched due retry jobs");
        }
        Ok(dispatched)
    }

    fn spawn_run(&self, media_id: MediaId, origin: RunOrigin) -> bool {
        let label = format!("{}:{}", origin.as_str(), media_id);
        let accepted = self
            .tasks
            .spawn(&label, run_unit(self.clone(), media_id.clone(), origin));
        if !accepted {
            tracing::warn!(media_id = %media_id, origin = origin.as_str(), "Analysis run not started");
        }
        accepted
    }

    #[tracing::instrument(skip_all, fields(media_id = %media_id, origin = origin.as_str()))]
    async fn run_analysis(&self, media_id: &MediaId, origin: RunOrigin, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            tracing::debug!("Analysis cancelled before start");
            return;
        }

        let record = match self.store.get(media_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!("Media record not found, skipping analysis");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load media record");
                return;
            }
        };

        let claimed_retry_count = record.ai_analysis.retry_count;
        let started_at = Utc::now();
        let mut claim = PartialUpdate::new()
            .set(fields::STATUS, AnalysisStatus::Processing.as_str())
            .set(fields::ANALYSIS_STARTED_AT, timestamp(started_at))
            .clear(fields::ANALYSIS_COMPLETED_AT)
            .clear(fields::NEXT_RETRY_AT)
            .clear(fields::ERROR_MESSAGE);
        for path in fields::RESULT_FIELDS {
            claim = claim.clear(path);
        }
        let claim = claim
            .when_status_in(origin.accepted_from())
            .guard(fields::RETRY_COUNT, [claimed_retry_count]);

        match self.store.update(media_id, &claim).await {
            Ok(UpdateOutcome::Applied) => {}
            Ok(UpdateOutcome::NotFound) => {
                tracing::warn!("Media record disappeared before processing");
                return;
            }
            Ok(UpdateOutcome::Rejected { current }) => {
                tracing::info!(status = %current, "Analysis not started from current status");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to mark analysis as processing");
                return;
            }
        }

        if origin == RunOrigin::Trigger {
            match self.retry_jobs.cancel_scheduled(media_id).await {
                Ok(0) => {}
                Ok(cancelled) => tracing::debug!(cancelled, "Superseded scheduled retries"),
                Err(e) => tracing::warn!(error = %e, "Failed to cancel scheduled retries"),
            }
        }

        tracing::info!(client = self.client.name(), "Analysis started");

        let scored = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!("Analysis cancelled while scoring, record left in processing");
                return;
            }
            scored = tokio::time::timeout(
                self.analysis_timeout,
                self.client.score(&record.url, record.media_type),
            ) => scored,
        };

        let failure = match scored {
            Ok(Ok(result)) => match self
                .complete(media_id, claimed_retry_count, started_at, result)
                .await
            {
                Ok(()) => return,
                Err(e) => e,
            },
            Ok(Err(e)) => e,
            Err(_) => anyhow!(
                "analysis timed out after {}s",
                self.analysis_timeout.as_secs()
            ),
        };

        self.handle_failure(media_id, claimed_retry_count, &format!("{:#}", failure))
            .await;
    }

    async fn complete(
        &self,
        media_id: &MediaId,
        claimed_retry_count: u32,
        started_at: DateTime<Utc>,
        result: AnalysisResult,
    ) -> anyhow::Result<()> {
        result
            .validate()
            .context("Scoring client returned an invalid result")?;

        let completed_at = Utc::now().max(started_at);
        let detailed: Map<String, Value> = result
            .detailed_analysis
            .iter()
            .map(|(name, score)| (name.clone(), Value::from(*score)))
            .collect();

        let update = PartialUpdate::new()
            .set(fields::STATUS, AnalysisStatus::Completed.as_str())
            .set(fields::RATING, result.rating.as_str())
            .set(fields::SUMMARY, result.summary)
            .set(fields::DETAILED_ANALYSIS, Value::Object(detailed))
            .set(
                fields::SPORT_SPECIFIC_METRICS,
                Value::Object(result.sport_specific_metrics),
            )
            .set(fields::CONFIDENCE_SCORE, result.confidence_score)
            .set(fields::ANALYSIS_COMPLETED_AT, timestamp(completed_at))
            .clear(fields::ERROR_MESSAGE)
            .clear(fields::NEXT_RETRY_AT)
            .when_status_in(&[AnalysisStatus::Processing])
            .guard(fields::RETRY_COUNT, [claimed_retry_count]);

        match self
            .store
            .update(media_id, &update)
            .await
            .context("Failed to write analysis result")?
        {
            UpdateOutcome::Applied => {
                tracing::info!(
                    rating = %result.rating,
                    confidence = result.confidence_score,
                    "Analysis completed"
                );
            }
            UpdateOutcome::NotFound => {
                tracing::warn!("Media record disappeared before the result was written");
            }
            UpdateOutcome::Rejected { current } => {
                tracing::warn!(status = %current, "Result discarded, record left processing");
            }
        }
        Ok(())
    }

    /// Decide between another attempt and the terminal `failed` state, using
    /// the stored retry count.
    async fn handle_failure(&self, media_id: &MediaId, claimed_retry_count: u32, cause: &str) {
        let record = match self.store.get(media_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!(error = %cause, "Media record not found while handling analysis failure");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, cause, "Failed to load media record after analysis failure");
                return;
            }
        };
        let state = &record.ai_analysis;
        if state.status != AnalysisStatus::Processing || state.retry_count != claimed_retry_count {
            tracing::warn!(
                status = %state.status,
                retry_count = state.retry_count,
                error = %cause,
                "Run superseded, failure not recorded"
            );
            return;
        }

        if !state.can_retry() {
            let mut update = PartialUpdate::new()
                .set(fields::STATUS, AnalysisStatus::Failed.as_str())
                .set(fields::ERROR_MESSAGE, cause)
                .clear(fields::NEXT_RETRY_AT);
            for path in fields::RESULT_FIELDS {
                update = update.clear(path);
            }
            let update = update
                .when_status_in(&[AnalysisStatus::Processing])
                .guard(fields::RETRY_COUNT, [claimed_retry_count]);

            match self.store.update(media_id, &update).await {
                Ok(UpdateOutcome::Applied) => tracing::error!(
                    retry_count = state.retry_count,
                    max_retries = state.max_retries,
                    error = %cause,
                    "Analysis failed permanently"
                ),
                Ok(outcome) => {
                    tracing::warn!(?outcome, "Failed state not written");
                }
                Err(e) => {
                    tracing::error!(error = %e, cause, "Failed to persist failed analysis state");
                }
            }
            return;
        }

        let retry_count = state.retry_count + 1;
        let delay = self.policy.delay(retry_count);
        let next_retry_at = TimeDelta::from_std(delay)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let update = PartialUpdate::new()
            .set(fields::STATUS, AnalysisStatus::Retrying.as_str())
            .set(fields::RETRY_COUNT, retry_count)
            .set(fields::NEXT_RETRY_AT, timestamp(next_retry_at))
            .set(fields::ERROR_MESSAGE, cause)
            .when_status_in(&[AnalysisStatus::Processing])
            .guard(fields::RETRY_COUNT, [claimed_retry_count]);

        match self.store.update(media_id, &update).await {
            Ok(UpdateOutcome::Applied) => {}
            Ok(outcome) => {
                tracing::warn!(?outcome, "Retrying state not written, no retry scheduled");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, cause, "Failed to persist retrying state");
                return;
            }
        }

        tracing::warn!(
            retry_count,
            max_retries = state.max_retries,
            delay_secs = delay.as_secs(),
            error = %cause,
            "Analysis failed, retry scheduled"
        );

        let job = RetryJob::scheduled(media_id.clone(), retry_count, next_retry_at);
        let job_id = match self.retry_jobs.schedule(&job).await {
            Ok(()) => Some(job.id),
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist retry job, only the in-process waiter remains");
                None
            }
        };

        let label = format!("retry-wait:{}", media_id);
        if !self
            .tasks
            .spawn(&label, waiter_unit(self.clone(), media_id.clone(), job_id, delay))
        {
            tracing::warn!(job_id = ?job_id, "Retry waiter not started, job left for the sweeper");
        }
    }

    /// Sleep out the backoff, claim the job, then run the retry inline.
    async fn wait_then_run(
        &self,
        media_id: &MediaId,
        job_id: Option<Uuid>,
        delay: Duration,
        cancel: &CancellationToken,
    ) {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(media_id = %media_id, "Retry waiter cancelled");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        if cancel.is_cancelled() {
            return;
        }

        if let Some(job_id) = job_id {
            match self.retry_jobs.claim(job_id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(media_id = %media_id, %job_id, "Retry job already dispatched or cancelled");
                    return;
                }
                Err(e) => {
                    tracing::error!(media_id = %media_id, %job_id, error = %e, "Failed to claim retry job");
                    return;
                }
            }
        }

        self.run_analysis(media_id, RunOrigin::ScheduledRetry, cancel)
            .await;
    }
}

fn run_unit(orchestrator: AnalysisOrchestrator, media_id: MediaId, origin: RunOrigin) -> UnitOfWork {
    Box::new(move |cancel: CancellationToken| {
        async move {
            orchestrator.run_analysis(&media_id, origin, &cancel).await;
        }
        .boxed()
    })
}

fn waiter_unit(
    orchestrator: AnalysisOrchestrator,
    media_id: MediaId,
    job_id: Option<Uuid>,
    delay: Duration,
) -> UnitOfWork {
    Box::new(move |cancel: CancellationToken| {
        async move {
            orchestrator
                .wait_then_run(&media_id, job_id, delay, &cancel)
                .await;
        }
        .boxed()
    })
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}
