//! Playscout DB Library
//!
//! Document and retry job stores behind `DocumentStore` / `RetryJobStore`,
//! with Postgres (JSONB) and in-memory backends.

use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub mod db;

pub use db::*;

const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Open a connection pool and apply pending migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!(max_connections, "Database pool ready");
    Ok(pool)
}
