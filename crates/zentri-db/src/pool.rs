//! Connection pool construction.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbError;

/// Default maximum connections held by the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connect to PostgreSQL and return a shared connection pool.
///
/// # Errors
///
/// Returns `DbError::ConnectionFailed` if the database is unreachable or the
/// URL is invalid.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, DbError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(DbError::ConnectionFailed)
}
