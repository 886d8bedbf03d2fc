//! Playscout Infrastructure Library
//!
//! Shared infrastructure used by the Playscout binaries:
//! - Telemetry initialization (tracing subscriber setup and shutdown)

#[cfg(feature = "observability-basic")]
pub mod telemetry;
