use anyhow::Result;
use std::sync::Arc;

use playscout_core::config::{ScoringConfig, ScoringProvider};

use crate::client::AnalysisClient;
use crate::simulated::SimulatedAnalysisClient;

/// Build the configured scoring client.
///
/// A remote provider without an API key or base URL falls back to the
/// simulated client with a warning.
pub fn create_analysis_client(config: &ScoringConfig) -> Result<Arc<dyn AnalysisClient>> {
    match config.provider {
        ScoringProvider::Mock => {
            tracing::info!(
                min_delay_ms = config.mock_min_delay_ms,
                max_delay_ms = config.mock_max_delay_ms,
                failure_rate = config.mock_failure_rate,
                "Using simulated scoring provider"
            );
            Ok(Arc::new(SimulatedAnalysisClient::from_config(config)))
        }
        ScoringProvider::Http if !config.http_ready() => {
            tracing::warn!(
                "AI_MODEL_PROVIDER=http without AI_API_KEY and AI_API_BASE_URL, falling back to simulated scoring"
            );
            Ok(Arc::new(SimulatedAnalysisClient::from_config(config)))
        }
        ScoringProvider::Http => create_http_client(config),
    }
}

#[cfg(feature = "http-client")]
fn create_http_client(config: &ScoringConfig) -> Result<Arc<dyn AnalysisClient>> {
    let base_url = config.api_base_url.as_deref().unwrap_or_default();
    let api_key = config.api_key.as_deref().unwrap_or_default();
    tracing::info!(base_url = %base_url, model = %config.model_name, "Using remote scoring provider");
    Ok(Arc::new(crate::http::HttpAnalysisClient::new(
        base_url,
        api_key,
        &config.model_name,
    )?))
}

#[cfg(not(feature = "http-client"))]
fn create_http_client(config: &ScoringConfig) -> Result<Arc<dyn AnalysisClient>> {
    tracing::warn!("Built without the http-client feature, falling back to simulated scoring");
    Ok(Arc::new(SimulatedAnalysisClient::from_config(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_provider_builds_simulated_client() {
        let client = create_analysis_client(&ScoringConfig::default()).unwrap();
        assert_eq!(client.name(), "mock");
    }

    #[test]
    fn incomplete_http_provider_falls_back() {
        let config = ScoringConfig {
            provider: ScoringProvider::Http,
            api_key: Some("key".to_string()),
            ..ScoringConfig::default()
        };
        let client = create_analysis_client(&config).unwrap();
        assert_eq!(client.name(), "mock");
    }

    #[cfg(feature = "http-client")]
    #[test]
    fn complete_http_provider_builds_remote_client() {
        let config = ScoringConfig {
            provider: ScoringProvider::Http,
            api_key: Some("key".to_string()),
            api_base_url: Some("https://scoring.example.com".to_string()),
            ..ScoringConfig::default()
        };
        let client = create_analysis_client(&config).unwrap();
        assert_eq!(client.name(), "http");
    }
}
