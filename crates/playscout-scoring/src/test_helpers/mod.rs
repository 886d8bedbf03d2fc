//! Deterministic scoring clients for pipeline tests
//!
//! No randomness and no latency unless asked for, so orchestrator tests can
//! script exact failure sequences.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Map;

use playscout_core::models::{AnalysisResult, MediaType, Rating};

use crate::client::AnalysisClient;

/// A fixed, valid result bundle.
pub fn sample_result() -> AnalysisResult {
    AnalysisResult {
        rating: Rating::Good,
        summary: "Good fundamentals, consistency to improve".to_string(),
        detailed_analysis: BTreeMap::from([
            ("technical_skills".to_string(), 7.5),
            ("physical_attributes".to_string(), 7.0),
            ("game_intelligence".to_string(), 8.0),
            ("consistency".to_string(), 6.5),
            ("potential".to_string(), 8.5),
        ]),
        sport_specific_metrics: Map::new(),
        confidence_score: 0.82,
    }
}

/// Fails the first `failures` calls, then succeeds with `sample_result()`.
#[derive(Debug)]
pub struct ScriptedAnalysisClient {
    failures: usize,
    latency: Duration,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl ScriptedAnalysisClient {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::failing(0)
    }

    pub fn always_failing() -> Self {
        Self::failing(usize::MAX)
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn scored_urls(&self) -> Vec<String> {
        self.urls.lock().map(|urls| urls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AnalysisClient for ScriptedAnalysisClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn score(&self, url: &str, _media_type: MediaType) -> Result<AnalysisResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if call < self.failures {
            return Err(anyhow::anyhow!("scoring attempt {} failed", call + 1));
        }
        Ok(sample_result())
    }
}
