//! Telemetry initialization
//!
//! Structured logging through `tracing`, filtered by `RUST_LOG`.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry, LogFormat, DEFAULT_FILTER};
