//! Insights subsystem — pattern summaries over a user's journal
//!
//! Fetch, compute, respond: the full record set is pulled once and handed
//! to the pure aggregator with an explicit reference instant. Failures here
//! are store failures; the aggregation itself has no error path.

use chrono::{DateTime, Utc};
use oneiric_core::models::DreamRecord;
use oneiric_core::patterns::{aggregate_patterns, DreamPatterns};
use oneiric_core::OneiricError;
use sqlx::PgPool;

/// Aggregate a user's dream patterns relative to `now`.
pub async fn dream_patterns(
    user_id: &str,
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<DreamPatterns, OneiricError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(OneiricError::Validation("user_id is required".to_string()));
    }

    let dreams: Vec<DreamRecord> = sqlx::query_as(
        r#"
        SELECT id, user_id, content, interpretation, symbols, emotions, themes, sleep_hours, created_at
        FROM dreams
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(aggregate_patterns(&dreams, now))
}
