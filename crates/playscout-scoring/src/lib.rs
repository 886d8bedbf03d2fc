//! Playscout Scoring Library
//!
//! The `AnalysisClient` seam between the analysis pipeline and whatever scores
//! media content: a simulated in-process provider and a remote HTTP service.

pub mod client;
pub mod factory;
#[cfg(feature = "http-client")]
pub mod http;
pub mod simulated;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use client::AnalysisClient;
pub use factory::create_analysis_client;
#[cfg(feature = "http-client")]
pub use http::HttpAnalysisClient;
pub use simulated::SimulatedAnalysisClient;
