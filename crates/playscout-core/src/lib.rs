//! Playscout Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! every Playscout component: the media record with its embedded analysis state,
//! the persisted retry job, the unified `AppError` and the environment-driven `Config`.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, RetryProfile, ScoringConfig, ScoringProvider};
pub use error::{AppError, ErrorMetadata, LogLevel};
