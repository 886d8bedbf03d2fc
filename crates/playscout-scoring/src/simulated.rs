//! Simulated scoring provider
//!
//! Produces plausible random results after a random latency. Used in
//! development and whenever no remote provider is configured.

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use playscout_core::config::ScoringConfig;
use playscout_core::models::{AnalysisResult, MediaType, Rating};

use crate::client::AnalysisClient;

/// Sub-scores reported for every media type, each in [6.0, 9.5].
pub const DETAILED_SCORES: [&str; 5] = [
    "technical_skills",
    "physical_attributes",
    "game_intelligence",
    "consistency",
    "potential",
];

enum MetricRange {
    Int(i64, i64),
    Float(f64, f64),
}

const VIDEO_METRICS: &[(&str, MetricRange)] = &[
    ("dribbling_accuracy", MetricRange::Int(70, 95)),
    ("passing_accuracy", MetricRange::Int(75, 90)),
    ("shooting_accuracy", MetricRange::Int(60, 85)),
    ("tackling_success_rate", MetricRange::Int(65, 90)),
    ("speed", MetricRange::Float(7.0, 9.5)),
    ("stamina", MetricRange::Float(7.0, 9.0)),
];

const REEL_METRICS: &[(&str, MetricRange)] = &[
    ("shooting_percentage", MetricRange::Int(35, 65)),
    ("rebounding_rate", MetricRange::Int(5, 15)),
    ("assist_rate", MetricRange::Int(2, 8)),
    ("steal_rate", MetricRange::Int(1, 4)),
    ("block_rate", MetricRange::Float(0.5, 3.0)),
    ("vertical_jump", MetricRange::Int(20, 40)),
];

const IMAGE_METRICS: &[(&str, MetricRange)] = &[
    ("athletic_presence", MetricRange::Float(7.0, 9.5)),
    ("physical_condition", MetricRange::Float(7.0, 9.5)),
    ("technique_display", MetricRange::Float(6.5, 9.0)),
];

fn metric_ranges(media_type: MediaType) -> &'static [(&'static str, MetricRange)] {
    match media_type {
        MediaType::Video => VIDEO_METRICS,
        MediaType::Reel => REEL_METRICS,
        MediaType::Image => IMAGE_METRICS,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn summary_for(rating: Rating, media_type: MediaType, technical: f64, game_intelligence: f64) -> String {
    match rating {
        Rating::Exceptional => format!(
            "Exceptional {media_type} showing elite technical skills ({technical}/10) and game intelligence ({game_intelligence}/10), with excellent consistency throughout."
        ),
        Rating::Excellent => format!(
            "Excellent {media_type} with strong technical ability ({technical}/10) and good reading of the game. High ceiling for development."
        ),
        Rating::Good => format!(
            "Good {media_type} with solid fundamentals. Technical skills ({technical}/10) are progressing, consistency is the next step."
        ),
        Rating::Developing => format!(
            "Developing player on this {media_type}: basics are in place, technical skills ({technical}/10) need refinement."
        ),
        Rating::NeedsImprovement => format!(
            "Several areas need work on this {media_type}. Technical skills ({technical}/10) require significant development; focus on fundamentals."
        ),
    }
}

/// Generate one random result bundle for a media type.
pub fn simulate_result<R: Rng>(rng: &mut R, media_type: MediaType) -> AnalysisResult {
    let rating = Rating::ALL[rng.random_range(0..Rating::ALL.len())];
    let confidence_score = round_to(rng.random_range(0.70..=0.95), 3);

    let detailed_analysis: BTreeMap<String, f64> = DETAILED_SCORES
        .iter()
        .map(|name| (name.to_string(), round_to(rng.random_range(6.0..=9.5), 1)))
        .collect();

    let mut sport_specific_metrics = Map::new();
    for (name, range) in metric_ranges(media_type) {
        let value = match *range {
            MetricRange::Int(min, max) => Value::from(rng.random_range(min..=max)),
            MetricRange::Float(min, max) => Value::from(round_to(rng.random_range(min..=max), 1)),
        };
        sport_specific_metrics.insert(name.to_string(), value);
    }

    let technical = detailed_analysis["technical_skills"];
    let game_intelligence = detailed_analysis["game_intelligence"];

    AnalysisResult {
        rating,
        summary: summary_for(rating, media_type, technical, game_intelligence),
        detailed_analysis,
        sport_specific_metrics,
        confidence_score,
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedAnalysisClient {
    min_delay: Duration,
    max_delay: Duration,
    failure_rate: f64,
}

impl SimulatedAnalysisClient {
    pub fn new(min_delay: Duration, max_delay: Duration, failure_rate: f64) -> Self {
        Self {
            min_delay: min_delay.min(max_delay),
            max_delay,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(
            Duration::from_millis(config.mock_min_delay_ms),
            Duration::from_millis(config.mock_max_delay_ms),
            config.mock_failure_rate,
        )
    }

    /// No latency, never fails.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 0.0)
    }

    fn pick_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        rand::rng().random_range(self.min_delay..=self.max_delay)
    }

    fn should_fail(&self) -> bool {
        self.failure_rate > 0.0 && rand::rng().random_bool(self.failure_rate)
    }
}

#[async_trait]
impl AnalysisClient for SimulatedAnalysisClient {
    fn name(&self) -> &str {
        "mock"
    }

    #[tracing::instrument(skip(self), fields(provider = "mock"))]
    async fn score(&self, url: &str, media_type: MediaType) -> Result<AnalysisResult> {
        let delay = self.pick_delay();
        tokio::time::sleep(delay).await;

        if self.should_fail() {
            return Err(anyhow::anyhow!("Simulated scoring failure for {}", url));
        }

        let result = simulate_result(&mut rand::rng(), media_type);
        tracing::debug!(
            rating = %result.rating,
            confidence = result.confidence_score,
            delay_ms = delay.as_millis() as u64,
            "Simulated analysis produced"
        );
        Ok(result)
    }
}
