use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

use playscout_core::models::{AnalysisResult, MediaType};

/// Scores one media item.
///
/// Any error is a transient failure from the pipeline's point of view; the
/// caller does not distinguish timeouts, malformed input or remote errors.
#[async_trait]
pub trait AnalysisClient: Send + Sync + Debug {
    /// Provider name, for logs
    fn name(&self) -> &str;

    async fn score(&self, url: &str, media_type: MediaType) -> Result<AnalysisResult>;
}
