//! Connection pool construction and store health probes.

use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

/// PostgreSQL server version string; errors when the store is unreachable.
pub async fn postgres_version(pool: &PgPool) -> Result<String, sqlx::Error> {
    let (version,): (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(version)
}

/// Installed pgvector version, `None` when the extension is absent.
/// Similarity lookups need the extension; the rest of the service does not.
pub async fn pgvector_version(pool: &PgPool) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT extversion FROM pg_extension WHERE extname = 'vector'")
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(v,)| v))
}
