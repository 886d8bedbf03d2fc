//! Media registration

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use playscout_core::models::{AnalysisStatus, MediaId, MediaRecord, MediaType};

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use crate::validation::validate_media_url;

#[derive(Debug, Deserialize)]
pub struct CreateMediaRequest {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

#[derive(Debug, Serialize)]
pub struct CreateMediaResponse {
    pub id: MediaId,
    pub status: AnalysisStatus,
}

/// Register an uploaded asset with a pending analysis and start analysing it.
pub async fn create_media(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateMediaRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    validate_media_url(&request.url)?;

    let record = MediaRecord::new(
        MediaId::generate(),
        request.url.trim(),
        request.media_type,
        state.orchestrator.policy().max_retries(),
    );
    state.store.insert(&record).await?;

    tracing::info!(
        media_id = %record.id,
        media_type = %record.media_type,
        "Media registered"
    );

    if !state.orchestrator.analyze(record.id.clone()) {
        tracing::warn!(media_id = %record.id, "Media stored but analysis not started");
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateMediaResponse {
            id: record.id,
            status: AnalysisStatus::Pending,
        }),
    ))
}
