use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Retry ceiling used when a stored record carries no explicit `max_retries`.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Dotted field paths of the `ai_analysis` sub-document, as addressed by partial updates.
pub mod fields {
    pub const AI_ANALYSIS: &str = "ai_analysis";
    pub const STATUS: &str = "ai_analysis.status";
    pub const RATING: &str = "ai_analysis.rating";
    pub const SUMMARY: &str = "ai_analysis.summary";
    pub const DETAILED_ANALYSIS: &str = "ai_analysis.detailed_analysis";
    pub const SPORT_SPECIFIC_METRICS: &str = "ai_analysis.sport_specific_metrics";
    pub const CONFIDENCE_SCORE: &str = "ai_analysis.confidence_score";
    pub const ANALYSIS_STARTED_AT: &str = "ai_analysis.analysis_started_at";
    pub const ANALYSIS_COMPLETED_AT: &str = "ai_analysis.analysis_completed_at";
    pub const RETRY_COUNT: &str = "ai_analysis.retry_count";
    pub const MAX_RETRIES: &str = "ai_analysis.max_retries";
    pub const NEXT_RETRY_AT: &str = "ai_analysis.next_retry_at";
    pub const ERROR_MESSAGE: &str = "ai_analysis.error_message";

    /// Fields that only carry data after a successful run.
    pub const RESULT_FIELDS: [&str; 5] = [
        RATING,
        SUMMARY,
        DETAILED_ANALYSIS,
        SPORT_SPECIFIC_METRICS,
        CONFIDENCE_SCORE,
    ];
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
            AnalysisStatus::Retrying => "retrying",
        }
    }

    /// Statuses a manual retry request may start from.
    pub fn accepts_manual_retry(&self) -> bool {
        matches!(self, AnalysisStatus::Failed)
    }
}

impl Display for AnalysisStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "processing" => Ok(AnalysisStatus::Processing),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            "retrying" => Ok(AnalysisStatus::Retrying),
            _ => Err(anyhow::anyhow!("Invalid analysis status: {}", s)),
        }
    }
}

/// Categorical tier assigned by the scoring collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Exceptional,
    Excellent,
    Good,
    Developing,
    NeedsImprovement,
}

impl Rating {
    pub const ALL: [Rating; 5] = [
        Rating::Exceptional,
        Rating::Excellent,
        Rating::Good,
        Rating::Developing,
        Rating::NeedsImprovement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Exceptional => "exceptional",
            Rating::Excellent => "excellent",
            Rating::Good => "good",
            Rating::Developing => "developing",
            Rating::NeedsImprovement => "needs_improvement",
        }
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Result bundle returned by a successful scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub rating: Rating,
    pub summary: String,
    pub detailed_analysis: BTreeMap<String, f64>,
    #[serde(default)]
    pub sport_specific_metrics: Map<String, Value>,
    pub confidence_score: f64,
}

impl AnalysisResult {
    /// Rejects bundles that would violate the stored-state invariants.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.confidence_score.is_finite() || !(0.0..=1.0).contains(&self.confidence_score) {
            anyhow::bail!(
                "confidence_score must be within [0.0, 1.0], got {}",
                self.confidence_score
            );
        }
        if let Some((name, value)) = self
            .detailed_analysis
            .iter()
            .find(|(_, value)| !value.is_finite())
        {
            anyhow::bail!("detailed_analysis.{} is not a finite number: {}", name, value);
        }
        Ok(())
    }
}

/// The `ai_analysis` sub-document embedded in each media record.
///
/// Every field is serialized, unset optionals as `null`, so the status endpoint
/// can return the snapshot verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisState {
    pub status: AnalysisStatus,
    pub rating: Option<Rating>,
    pub summary: Option<String>,
    pub detailed_analysis: Option<BTreeMap<String, f64>>,
    pub sport_specific_metrics: Option<Map<String, Value>>,
    pub confidence_score: Option<f64>,
    pub analysis_started_at: Option<DateTime<Utc>>,
    pub analysis_completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Default for AnalysisState {
    fn default() -> Self {
        Self::pending(DEFAULT_MAX_RETRIES)
    }
}

impl AnalysisState {
    /// Baseline written on upload: nothing attempted yet.
    pub fn pending(max_retries: u32) -> Self {
        Self {
            status: AnalysisStatus::Pending,
            rating: None,
            summary: None,
            detailed_analysis: None,
            sport_specific_metrics: None,
            confidence_score: None,
            analysis_started_at: None,
            analysis_completed_at: None,
            retry_count: 0,
            max_retries,
            next_retry_at: None,
            error_message: None,
        }
    }

    /// Baseline written by a manual retry: a fresh attempt with the spent budget carried over.
    pub fn reset_for_retry(retry_count: u32, max_retries: u32) -> Self {
        Self {
            retry_count,
            ..Self::pending(max_retries)
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// True when any success-only field carries data.
    pub fn has_result(&self) -> bool {
        self.rating.is_some()
            || self.summary.is_some()
            || self.detailed_analysis.is_some()
            || self.sport_specific_metrics.is_some()
            || self.confidence_score.is_some()
    }
}
