//! Media analysis API integration tests.
//!
//! Run with: `cargo test -p playscout-api --test media_api_test`

mod helpers;

use axum::http::StatusCode;
use serde_json::{json, Value};

use helpers::{api_path, setup_test_app, setup_test_app_with};
use playscout_core::models::{AnalysisState, AnalysisStatus};
use playscout_scoring::test_helpers::ScriptedAnalysisClient;
use playscout_worker::BackgroundTasks;

fn failed(retry_count: u32, max_retries: u32) -> AnalysisState {
    AnalysisState {
        status: AnalysisStatus::Failed,
        retry_count,
        error_message: Some("scoring service unavailable".to_string()),
        ..AnalysisState::pending(max_retries)
    }
}

#[tokio::test]
async fn test_upload_registers_and_analyses_media() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post(&api_path("/media"))
        .json(&json!({ "url": "https://cdn.example.com/match.mp4", "type": "video" }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["status"], "pending");
    let id = body["id"].as_str().unwrap().to_string();

    app.settle().await;

    let response = client.get(&api_path(&format!("/media/{}/status", id))).await;
    response.assert_status_ok();
    let status: Value = response.json();
    assert_eq!(status["status"], "completed");
    assert_eq!(status["rating"], "good");
    assert_eq!(status["retry_count"], 0);
    assert_eq!(status["max_retries"], 2);
    assert!(status["error_message"].is_null());
    assert!(status["next_retry_at"].is_null());
    assert_eq!(app.client.calls(), 1);
}

#[tokio::test]
async fn test_upload_rejects_invalid_input() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post(&api_path("/media"))
        .json(&json!({ "url": "ftp://cdn.example.com/match.mp4", "type": "video" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");

    let response = client
        .post(&api_path("/media"))
        .json(&json!({ "url": "https://cdn.example.com/a.gif", "type": "gif" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_status_snapshot_has_every_field() {
    let app = setup_test_app().await;
    let id = app.seed("m1", failed(1, 3)).await;

    let response = app
        .client()
        .get(&api_path(&format!("/media/{}/status", id)))
        .await;
    response.assert_status_ok();
    let status: Value = response.json();
    let fields = status.as_object().unwrap();
    for name in [
        "status",
        "rating",
        "summary",
        "detailed_analysis",
        "sport_specific_metrics",
        "confidence_score",
        "analysis_started_at",
        "analysis_completed_at",
        "retry_count",
        "max_retries",
        "next_retry_at",
        "error_message",
    ] {
        assert!(fields.contains_key(name), "missing field {}", name);
    }
    assert_eq!(status["status"], "failed");
    assert_eq!(status["error_message"], "scoring service unavailable");
}

#[tokio::test]
async fn test_unknown_media_is_not_found() {
    let app = setup_test_app().await;
    let client = app.client();

    for response in [
        client.get(&api_path("/media/ghost/status")).await,
        client.post(&api_path("/media/ghost/analyze")).await,
        client.post(&api_path("/media/ghost/retry-analysis")).await,
    ] {
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["code"], "NOT_FOUND");
    }
    assert_eq!(app.client.calls(), 0);
}

#[tokio::test]
async fn test_analyze_trigger_is_acknowledged() {
    let app = setup_test_app().await;
    let id = app.seed("m1", AnalysisState::pending(2)).await;

    let response = app
        .client()
        .post(&api_path(&format!("/media/{}/analyze", id)))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["media_id"], "m1");
    assert!(body["message"].is_string());

    app.settle().await;
    let record = app.store.raw(&id).await.unwrap();
    assert_eq!(record["ai_analysis"]["status"], "completed");
}

#[tokio::test]
async fn test_analyze_refuses_failed_and_processing_records() {
    let app = setup_test_app().await;
    let failed_id = app.seed("failed", failed(1, 3)).await;
    let running_id = app
        .seed(
            "running",
            AnalysisState {
                status: AnalysisStatus::Processing,
                analysis_started_at: Some(chrono::Utc::now()),
                ..AnalysisState::pending(3)
            },
        )
        .await;

    for (id, status) in [(&failed_id, "failed"), (&running_id, "processing")] {
        let response = app
            .client()
            .post(&api_path(&format!("/media/{}/analyze", id)))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "ANALYSIS_NOT_RETRYABLE");

        let record = app.store.raw(id).await.unwrap();
        assert_eq!(record["ai_analysis"]["status"], status);
    }

    assert_eq!(app.registry.count(), 0);
    assert_eq!(app.client.calls(), 0);
}

#[tokio::test]
async fn test_retry_of_failed_analysis_is_accepted() {
    let app = setup_test_app().await;
    let id = app.seed("m1", failed(1, 3)).await;

    let response = app
        .client()
        .post(&api_path(&format!("/media/{}/retry-analysis", id)))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["retry_count"], 2);
    assert_eq!(body["media_id"], "m1");

    app.settle().await;
    let status: Value = app
        .client()
        .get(&api_path(&format!("/media/{}/status", id)))
        .await
        .json();
    assert_eq!(status["status"], "completed");
    assert_eq!(status["retry_count"], 2);
    assert!(status["error_message"].is_null());
}

#[tokio::test]
async fn test_retry_conflicts() {
    let app = setup_test_app().await;
    let exhausted = app.seed("spent", failed(3, 3)).await;
    let completed = app
        .seed(
            "done",
            AnalysisState {
                status: AnalysisStatus::Completed,
                ..AnalysisState::pending(3)
            },
        )
        .await;

    let response = app
        .client()
        .post(&api_path(&format!("/media/{}/retry-analysis", exhausted)))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "RETRY_BUDGET_EXHAUSTED");

    let response = app
        .client()
        .post(&api_path(&format!("/media/{}/retry-analysis", completed)))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "ANALYSIS_NOT_RETRYABLE");

    assert_eq!(app.client.calls(), 0);
    let record = app.store.raw(&exhausted).await.unwrap();
    assert_eq!(record["ai_analysis"]["retry_count"], 3);
    assert_eq!(record["ai_analysis"]["status"], "failed");
}

#[tokio::test]
async fn test_failed_scoring_is_visible_in_status() {
    let app = setup_test_app_with(ScriptedAnalysisClient::always_failing()).await;
    let id = app
        .seed(
            "m1",
            AnalysisState {
                retry_count: 2,
                ..AnalysisState::pending(2)
            },
        )
        .await;

    app.client()
        .post(&api_path(&format!("/media/{}/analyze", id)))
        .await
        .assert_status(StatusCode::ACCEPTED);
    app.settle().await;

    let status: Value = app
        .client()
        .get(&api_path(&format!("/media/{}/status", id)))
        .await
        .json();
    assert_eq!(status["status"], "failed");
    assert_eq!(status["error_message"], "scoring attempt 1 failed");
    assert!(status["rating"].is_null());
}
