//! Route configuration and setup

pub mod health;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::constants::API_PREFIX;
use crate::handlers::{analysis, media};
use crate::state::AppState;

fn media_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media", post(media::create_media))
        .route("/media/{id}/analyze", post(analysis::trigger_analysis))
        .route("/media/{id}/retry-analysis", post(analysis::retry_analysis))
        .route("/media/{id}/status", get(analysis::get_analysis_status))
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::liveness_check))
        .route("/health/ready", get(health::readiness_check))
}

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .nest(API_PREFIX, media_routes())
        .merge(health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
