//! Persistence for the analysis pipeline
//!
//! `document` defines the media document contract with dotted-path partial
//! updates; `retry_job` the durable retry schedule. Both have Postgres and
//! in-memory implementations.
//
// Media document contract and JSON path helpers
pub mod document;
//
// In-memory implementations
pub mod memory;
//
// PostgreSQL implementations
pub mod postgres;
pub mod retry_job;

pub use document::{DocumentStore, FieldGuard, PartialUpdate, UpdateOutcome};
pub use memory::{InMemoryDocumentStore, InMemoryRetryJobStore};
pub use postgres::PostgresDocumentStore;
pub use retry_job::{PostgresRetryJobStore, RetryJobStore};
