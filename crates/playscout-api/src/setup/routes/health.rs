//! Health check handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub background_tasks: usize,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub store: String,
}

/// Liveness probe - process is running.
pub async fn liveness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(LivenessResponse {
        status: "alive",
        background_tasks: state.background_tasks(),
    })
}

/// Readiness probe - the document store answers.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = match tokio::time::timeout(READINESS_TIMEOUT, state.store.ping()).await {
        Ok(Ok(())) => "ready".to_string(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Store readiness check failed");
            format!("not_ready: {}", e)
        }
        Err(_) => {
            tracing::error!("Store readiness check timed out");
            "timeout".to_string()
        }
    };

    if store == "ready" {
        (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                store,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                store,
            }),
        )
    }
}
