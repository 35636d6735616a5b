//! Database connection management
//!
//! Pool tuning and the readiness probe the evaluation hot path depends on.

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::DatabaseConfig;

/// Acquire timeout for pool checkouts. Evaluation requests carry their own
/// deadline; a saturated pool should fail the request fast rather than queue
/// behind it.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// How long an idle connection may linger before the pool closes it.
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Create the connection pool used by both the authoring and runtime paths.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .connect(&config.url)
        .await
}

/// Readiness probe: the engine cannot compile or evaluate anything until the
/// operator catalog is migrated and seeded, so probe that instead of a bare
/// `SELECT 1`.
pub async fn check_ready(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let seeded: bool = sqlx::query_scalar(
        r#"SELECT EXISTS(SELECT 1 FROM catalog.operator_catalog WHERE is_active)"#,
    )
    .fetch_one(pool)
    .await?;

    Ok(seeded)
}
