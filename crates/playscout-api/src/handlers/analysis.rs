//! Analysis triggers and status

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use playscout_core::models::{AnalysisState, AnalysisStatus, MediaId, MediaRecord};
use playscout_core::AppError;
use playscout_worker::RetryDecision;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AnalysisAccepted {
    pub message: String,
    pub media_id: MediaId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

async fn load_media(state: &AppState, media_id: &MediaId) -> Result<MediaRecord, AppError> {
    state
        .store
        .get(media_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Media {} not found", media_id)))
}

/// Fire-and-forget analysis trigger.
pub async fn trigger_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let media_id = MediaId::new(id);
    let record = load_media(&state, &media_id).await?;

    // A failed record restarts through the retry endpoint and its budget check;
    // a processing one already has a run.
    let status = record.ai_analysis.status;
    if matches!(status, AnalysisStatus::Failed | AnalysisStatus::Processing) {
        return Err(AppError::AnalysisNotRetryable { status }.into());
    }

    if !state.orchestrator.analyze(media_id.clone()) {
        return Err(AppError::ServiceUnavailable(
            "Server is shutting down, analysis not started".to_string(),
        )
        .into());
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalysisAccepted {
            message: "Analysis started".to_string(),
            media_id,
            retry_count: None,
        }),
    ))
}

/// Manual retry of a failed analysis. Spends one unit of the record's retry budget.
pub async fn retry_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let media_id = MediaId::new(id);

    match state.orchestrator.retry(&media_id).await? {
        RetryDecision::Accepted { retry_count } => Ok((
            StatusCode::ACCEPTED,
            Json(AnalysisAccepted {
                message: "Analysis retry started".to_string(),
                media_id,
                retry_count: Some(retry_count),
            }),
        )),
        RetryDecision::BudgetExhausted {
            retry_count,
            max_retries,
        } => Err(AppError::RetryBudgetExhausted {
            retry_count,
            max_retries,
        }
        .into()),
        RetryDecision::NotRetryable { status } => {
            Err(AppError::AnalysisNotRetryable { status }.into())
        }
        RetryDecision::NotFound => {
            Err(AppError::NotFound(format!("Media {} not found", media_id)).into())
        }
    }
}

/// Current analysis snapshot, verbatim.
pub async fn get_analysis_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisState>, HttpAppError> {
    let record = load_media(&state, &MediaId::new(id)).await?;
    Ok(Json(record.ai_analysis))
}
