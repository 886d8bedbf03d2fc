//! Playscout API Library
//!
//! HTTP surface of the media-analysis pipeline: upload registration, analysis
//! triggers, manual retries, status reads and health probes.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
mod validation;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
