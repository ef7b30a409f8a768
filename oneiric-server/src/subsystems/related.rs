//! Related-dreams subsystem — similarity lookup for one dream
//!
//! Fetches the query dream's stored vector plus all candidate vectors for
//! the same user, then ranks them in memory with the pure cosine ranker.
//! Candidates without a stored embedding are excluded by the SQL pre-filter
//! (`embedding IS NOT NULL`), never scored as zero; candidates embedded
//! with a different model are likewise filtered out, since cross-model
//! comparison is undefined.

use chrono::{DateTime, Utc};
use oneiric_core::similarity::{rank_by_similarity, DEFAULT_LIMIT, MAX_LIMIT};
use oneiric_core::OneiricError;
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarDream {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub similarity_score: f64,
}

/// Rank the user's other dreams by similarity to the given one.
///
/// `NotFound` when the dream does not exist, or exists but has no stored
/// embedding yet (the caller should trigger embedding first).
pub async fn find_similar(
    dream_id: Uuid,
    limit: Option<u32>,
    pool: &PgPool,
) -> Result<Vec<SimilarDream>, OneiricError> {
    let limit = limit
        .map(|l| (l as usize).clamp(1, MAX_LIMIT))
        .unwrap_or(DEFAULT_LIMIT);

    // Both joined columns are nullable: a dream may have no embeddings row
    // at all, or a placeholder row whose vector is still NULL.
    let query_row: Option<(String, Option<Vector>, Option<String>)> = sqlx::query_as(
        r#"
        SELECT d.user_id, e.embedding, e.model_name
        FROM dreams d
        LEFT JOIN dream_embeddings e ON e.dream_id = d.id
        WHERE d.id = $1
        "#,
    )
    .bind(dream_id)
    .fetch_optional(pool)
    .await?;

    let (user_id, query_vector, model_name) = match query_row {
        None => {
            return Err(OneiricError::NotFound(format!(
                "Dream {} not found",
                dream_id
            )))
        }
        Some((user_id, Some(vector), Some(model_name))) => (user_id, vector, model_name),
        Some(_) => {
            return Err(OneiricError::NotFound(format!(
                "Dream {} has no embedding — generate embeddings first",
                dream_id
            )))
        }
    };

    let candidate_rows: Vec<(Uuid, String, DateTime<Utc>, Vector)> = sqlx::query_as(
        r#"
        SELECT d.id, d.content, d.created_at, e.embedding
        FROM dream_embeddings e
        JOIN dreams d ON d.id = e.dream_id
        WHERE d.user_id = $1
          AND e.dream_id <> $2
          AND e.embedding IS NOT NULL
          AND e.model_name = $3
        ORDER BY d.created_at ASC
        "#,
    )
    .bind(&user_id)
    .bind(dream_id)
    .bind(&model_name)
    .fetch_all(pool)
    .await?;

    let query: Vec<f32> = query_vector.into();

    let candidates: Vec<((Uuid, String, DateTime<Utc>), Vec<f32>)> = candidate_rows
        .into_iter()
        .map(|(id, content, created_at, vector)| ((id, content, created_at), vector.into()))
        .collect();

    let ranked = rank_by_similarity(&query, candidates, limit);

    Ok(ranked
        .into_iter()
        .map(|m| {
            let (id, content, created_at) = m.item;
            SimilarDream {
                id,
                content,
                created_at,
                similarity_score: m.similarity_score,
            }
        })
        .collect())
}
