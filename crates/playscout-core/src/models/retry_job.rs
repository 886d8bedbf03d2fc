use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::media::MediaId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryJobStatus {
    /// Waiting for `run_at`; not yet handed to the orchestrator.
    Scheduled,
    /// Claimed by a waiter or the sweeper and dispatched exactly once.
    Dispatched,
    Cancelled,
}

impl Display for RetryJobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RetryJobStatus::Scheduled => write!(f, "scheduled"),
            RetryJobStatus::Dispatched => write!(f, "dispatched"),
            RetryJobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for RetryJobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(RetryJobStatus::Scheduled),
            "dispatched" => Ok(RetryJobStatus::Dispatched),
            "cancelled" => Ok(RetryJobStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid retry job status: {}", s)),
        }
    }
}

/// Durable record of one scheduled automatic retry.
///
/// Kept separately from the media record so that retries survive a process
/// restart: anything still `Scheduled` past `run_at` is picked up by the sweeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryJob {
    pub id: Uuid,
    pub media_id: MediaId,
    /// Value of `ai_analysis.retry_count` written when this retry was scheduled.
    pub attempt: u32,
    pub run_at: DateTime<Utc>,
    pub status: RetryJobStatus,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl RetryJob {
    pub fn scheduled(media_id: MediaId, attempt: u32, run_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            media_id,
            attempt,
            run_at,
            status: RetryJobStatus::Scheduled,
            created_at: Utc::now(),
            dispatched_at: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == RetryJobStatus::Scheduled && self.run_at <= now
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for RetryJob {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(RetryJob {
            id: row.try_get("id")?,
            media_id: MediaId::new(row.try_get::<String, _>("media_id")?),
            attempt: row.try_get::<i32, _>("attempt")?.max(0) as u32,
            run_at: row.try_get("run_at")?,
            status: row.try_get::<String, _>("status")?.parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse retry job status: {}", e).into())
            })?,
            created_at: row.try_get("created_at")?,
            dispatched_at: row.try_get("dispatched_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn scheduled_job_is_due_only_after_run_at() {
        let now = Utc::now();
        let job = RetryJob::scheduled(MediaId::new("m1"), 1, now + Duration::seconds(30));
        assert!(!job.is_due(now));
        assert!(job.is_due(now + Duration::seconds(30)));
    }

    #[test]
    fn dispatched_job_is_never_due() {
        let now = Utc::now();
        let mut job = RetryJob::scheduled(MediaId::new("m1"), 1, now);
        job.status = RetryJobStatus::Dispatched;
        assert!(!job.is_due(now + Duration::hours(1)));
    }

    #[test]
    fn status_parses_display_output() {
        for status in [
            RetryJobStatus::Scheduled,
            RetryJobStatus::Dispatched,
            RetryJobStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<RetryJobStatus>().unwrap(), status);
        }
    }
}
