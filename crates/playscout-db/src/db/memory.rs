//! In-process stores, used when no `DATABASE_URL` is configured and in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use playscout_core::models::{MediaId, MediaRecord, RetryJob, RetryJobStatus};
use playscout_core::AppError;

use super::document::{
    document_from_record, lookup_path, record_from_document, set_path, DocumentStore,
    PartialUpdate, UpdateOutcome,
};
use super::retry_job::RetryJobStore;

/// Documents held as JSON values; every update runs under one write lock.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    docs: Arc<RwLock<HashMap<MediaId, Value>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored document, for assertions on the persisted layout.
    pub async fn raw(&self, id: &MediaId) -> Option<Value> {
        self.docs.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &MediaId) -> bool {
        self.docs.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: &MediaId) -> Result<Option<MediaRecord>, AppError> {
        let doc = self.docs.read().await.get(id).cloned();
        doc.map(record_from_document).transpose()
    }

    async fn insert(&self, record: &MediaRecord) -> Result<(), AppError> {
        let doc = document_from_record(record)?;
        self.docs.write().await.insert(record.id.clone(), doc);
        Ok(())
    }

    async fn update(
        &self,
        id: &MediaId,
        update: &PartialUpdate,
    ) -> Result<UpdateOutcome, AppError> {
        let mut docs = self.docs.write().await;
        let Some(doc) = docs.get_mut(id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        let guards_hold = update.guards().iter().all(|guard| {
            let current = lookup_path(&*doc, &guard.path).unwrap_or(&Value::Null);
            guard.allowed.contains(current)
        });
        if !guards_hold {
            let current = update
                .guards()
                .first()
                .and_then(|guard| lookup_path(&*doc, &guard.path))
                .cloned()
                .unwrap_or(Value::Null);
            return Ok(UpdateOutcome::Rejected { current });
        }

        for (path, value) in update.sets() {
            set_path(doc, path, value.clone());
        }
        Ok(UpdateOutcome::Applied)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRetryJobStore {
    jobs: Arc<RwLock<HashMap<Uuid, RetryJob>>>,
}

impl InMemoryRetryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All jobs for a media id, oldest first.
    pub async fn for_media(&self, media_id: &MediaId) -> Vec<RetryJob> {
        let mut jobs: Vec<RetryJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| &job.media_id == media_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }
}

#[async_trait]
impl RetryJobStore for InMemoryRetryJobStore {
    async fn schedule(&self, job: &RetryJob) -> Result<(), AppError> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn claim(&self, id: Uuid) -> Result<bool, AppError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status == RetryJobStatus::Scheduled => {
                job.status = RetryJobStatus::Dispatched;
                job.dispatched_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<RetryJob>, AppError> {
        let mut due: Vec<RetryJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|job| job.run_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn cancel_scheduled(&self, media_id: &MediaId) -> Result<u64, AppError> {
        let mut cancelled = 0;
        for job in self.jobs.write().await.values_mut() {
            if &job.media_id == media_id && job.status == RetryJobStatus::Scheduled {
                job.status = RetryJobStatus::Cancelled;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    async fn get(&self, id: Uuid) -> Result<Option<RetryJob>, AppError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use playscout_core::models::{fields, AnalysisStatus, MediaType};
    use serde_json::json;

    fn record(id: &str) -> MediaRecord {
        MediaRecord::new(
            MediaId::new(id),
            "https://cdn.example.com/clip.mp4".to_string(),
            MediaType::Video,
            5,
        )
    }

    #[tokio::test]
    async fn update_touches_only_named_fields() {
        let store = InMemoryDocumentStore::new();
        store.insert(&record("m1")).await.unwrap();

        let outcome = store
            .update(
                &MediaId::new("m1"),
                &PartialUpdate::new().set(fields::ERROR_MESSAGE, "boom"),
            )
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Applied);

        let stored = store.get(&MediaId::new("m1")).await.unwrap().unwrap();
        assert_eq!(stored.ai_analysis.error_message.as_deref(), Some("boom"));
        assert_eq!(stored.ai_analysis.status, AnalysisStatus::Pending);
        assert_eq!(stored.url, "https://cdn.example.com/clip.mp4");
    }

    #[tokio::test]
    async fn update_on_missing_record_reports_not_found() {
        let store = InMemoryDocumentStore::new();
        let outcome = store
            .update(
                &MediaId::new("ghost"),
                &PartialUpdate::new().set(fields::STATUS, "processing"),
            )
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn guard_mismatch_leaves_record_unchanged() {
        let store = InMemoryDocumentStore::new();
        store.insert(&record("m1")).await.unwrap();
        let id = MediaId::new("m1");

        let outcome = store
            .update(
                &id,
                &PartialUpdate::new()
                    .set(fields::STATUS, "pending")
                    .when_status_in(&[AnalysisStatus::Failed]),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::Rejected {
                current: json!("pending")
            }
        );
        assert_eq!(store.raw(&id).await.unwrap()["ai_analysis"]["retry_count"], 0);
    }

    #[tokio::test]
    async fn claim_succeeds_once() {
        let store = InMemoryRetryJobStore::new();
        let job = RetryJob::scheduled(MediaId::new("m1"), 1, Utc::now());
        store.schedule(&job).await.unwrap();

        assert!(store.claim(job.id).await.unwrap());
        assert!(!store.claim(job.id).await.unwrap());
        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RetryJobStatus::Dispatched);
        assert!(stored.dispatched_at.is_some());
    }

    #[tokio::test]
    async fn due_returns_scheduled_jobs_in_run_order() {
        let store = InMemoryRetryJobStore::new();
        let now = Utc::now();
        let later = RetryJob::scheduled(MediaId::new("m1"), 1, now - Duration::seconds(5));
        let earlier = RetryJob::scheduled(MediaId::new("m2"), 1, now - Duration::seconds(30));
        let future = RetryJob::scheduled(MediaId::new("m3"), 1, now + Duration::seconds(30));
        for job in [&later, &earlier, &future] {
            store.schedule(job).await.unwrap();
        }

        let due = store.due(now, 10).await.unwrap();
        let ids: Vec<Uuid> = due.iter().map(|job| job.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);

        assert_eq!(store.due(now, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancel_scheduled_skips_dispatched_jobs() {
        let store = InMemoryRetryJobStore::new();
        let media = MediaId::new("m1");
        let dispatched = RetryJob::scheduled(media.clone(), 1, Utc::now());
        let pending = RetryJob::scheduled(media.clone(), 2, Utc::now());
        store.schedule(&dispatched).await.unwrap();
        store.schedule(&pending).await.unwrap();
        store.claim(dispatched.id).await.unwrap();

        assert_eq!(store.cancel_scheduled(&media).await.unwrap(), 1);
        assert!(!store.claim(pending.id).await.unwrap());
    }
}
