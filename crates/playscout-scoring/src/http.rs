//! Remote scoring service client
//!
//! `POST {base_url}/analyze` with a bearer token and
//! `{ "media_url", "media_type", "model" }`; the response body is the result bundle.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use playscout_core::models::{AnalysisResult, MediaType};

use crate::client::AnalysisClient;

const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    media_url: &'a str,
    media_type: MediaType,
    model: &'a str,
}

pub struct HttpAnalysisClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl Debug for HttpAnalysisClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("HttpAnalysisClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client for scoring service")?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    fn name(&self) -> &str {
        "http"
    }

    #[tracing::instrument(skip(self), fields(provider = "http", model = %self.model))]
    async fn score(&self, url: &str, media_type: MediaType) -> Result<AnalysisResult> {
        let request_body = AnalyzeRequest {
            media_url: url,
            media_type,
            model: &self.model,
        };

        let response = self
            .http_client
            .post(format!("{}/analyze", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to scoring service")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Scoring service request failed: {} - {}",
                status,
                error_text
            ));
        }

        let result: AnalysisResult = response
            .json()
            .await
            .context("Failed to parse scoring service response")?;

        result
            .validate()
            .context("Scoring service returned an invalid result")?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use playscout_core::models::Rating;
    use serde_json::json;

    fn result_body(confidence: f64) -> String {
        json!({
            "rating": "excellent",
            "summary": "Strong first touch and quick release",
            "detailed_analysis": {
                "technical_skills": 8.4,
                "physical_attributes": 7.9,
                "game_intelligence": 8.1,
                "consistency": 7.2,
                "potential": 9.0
            },
            "sport_specific_metrics": { "passing_accuracy": 88 },
            "confidence_score": confidence
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_score_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/analyze")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({
                "media_url": "https://cdn.example.com/m1.mp4",
                "media_type": "video",
                "model": "gpt-4-vision-preview"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(result_body(0.91))
            .create_async()
            .await;

        let client =
            HttpAnalysisClient::new(&server.url(), "test-key", "gpt-4-vision-preview").unwrap();
        let result = client
            .score("https://cdn.example.com/m1.mp4", MediaType::Video)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.rating, Rating::Excellent);
        assert_eq!(result.detailed_analysis["potential"], 9.0);
        assert_eq!(result.sport_specific_metrics["passing_accuracy"], 88);
    }

    #[tokio::test]
    async fn test_score_server_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/analyze")
            .with_status(503)
            .with_body("model overloaded")
            .create_async()
            .await;

        let client = HttpAnalysisClient::new(&server.url(), "k", "m").unwrap();
        let err = client
            .score("https://cdn.example.com/m1.mp4", MediaType::Video)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("model overloaded"));
    }

    #[tokio::test]
    async fn test_score_rejects_out_of_range_confidence() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/analyze")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(result_body(1.7))
            .create_async()
            .await;

        let client = HttpAnalysisClient::new(&server.url(), "k", "m").unwrap();
        let result = client
            .score("https://cdn.example.com/m1.jpg", MediaType::Image)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_score_rejects_unknown_rating() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/analyze")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "rating": "legendary",
                    "summary": "",
                    "detailed_analysis": {},
                    "confidence_score": 0.8
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = HttpAnalysisClient::new(&format!("{}/", server.url()), "k", "m").unwrap();
        let err = client
            .score("https://cdn.example.com/m1.jpg", MediaType::Image)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse scoring service response"));
    }
}
