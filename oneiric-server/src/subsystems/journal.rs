//! Journal subsystem — dream creation and retrieval
//!
//! Creation is the only write path for dreams: the entry is interpreted by
//! the LLM (gracefully degrading to an empty analysis when the API is
//! down), inserted together with its embedding placeholder row, counted
//! toward the user's progress, and handed to the background embedder. The
//! HTTP response never waits for embedding.

use oneiric_core::interpreter::{DreamAnalysis, GeminiInterpreter};
use oneiric_core::models::DreamRecord;
use oneiric_core::{OneiricConfig, OneiricError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::subsystems::{embedder, progress};

/// Maximum rows returned by a listing request.
const MAX_LIST_LIMIT: i64 = 100;

/// Default listing page size.
const DEFAULT_LIST_LIMIT: i64 = 20;

#[derive(Debug, Clone)]
pub struct NewDream {
    pub user_id: String,
    pub content: String,
    pub sleep_hours: Option<f64>,
}

/// Create a dream entry: interpret, persist, track progress, queue embedding.
pub async fn create_dream(
    req: NewDream,
    pool: &PgPool,
    config: &OneiricConfig,
) -> Result<DreamRecord, OneiricError> {
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(OneiricError::Validation("user_id is required".to_string()));
    }
    let content = req.content.trim();
    if content.is_empty() {
        return Err(OneiricError::Validation("content is required".to_string()));
    }
    if let Some(h) = req.sleep_hours {
        if !h.is_finite() || h < 0.0 || h > 24.0 {
            return Err(OneiricError::Validation(
                "sleep_hours must be between 0 and 24".to_string(),
            ));
        }
    }

    let analysis = interpret_or_default(content, config).await;

    let mut tx = pool.begin().await?;

    let dream: DreamRecord = sqlx::query_as(
        r#"
        INSERT INTO dreams (user_id, content, interpretation, symbols, emotions, themes, sleep_hours)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, user_id, content, interpretation, symbols, emotions, themes, sleep_hours, created_at
        "#,
    )
    .bind(user_id)
    .bind(content)
    .bind(&analysis.interpretation)
    .bind(&analysis.symbols)
    .bind(&analysis.emotions)
    .bind(&analysis.themes)
    .bind(req.sleep_hours)
    .fetch_one(&mut *tx)
    .await?;

    // Placeholder row; the embedding column stays NULL until the background
    // embedder or the backfill worker fills it.
    sqlx::query(
        "INSERT INTO dream_embeddings (dream_id, model_name) VALUES ($1, $2)",
    )
    .bind(dream.id)
    .bind(&config.embedding.model)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(id = %dream.id, user_id = %user_id, "Dream logged");

    if let Err(e) = progress::record_entry(
        pool,
        user_id,
        dream.created_at.date_naive(),
        config.gamify.xp_per_dream as i64,
    )
    .await
    {
        // Progress bookkeeping must never fail the journal write.
        tracing::warn!(user_id = %user_id, error = %e, "Progress update failed");
    }

    embedder::spawn_embed_task(dream.id, pool.clone(), config.clone());

    Ok(dream)
}

/// Run the interpreter; a missing key or exhausted retries degrade to an
/// empty analysis rather than rejecting the entry.
async fn interpret_or_default(content: &str, config: &OneiricConfig) -> DreamAnalysis {
    let api_key = std::env::var("GOOGLE_API_KEY").unwrap_or_default();

    let client = match GeminiInterpreter::new(&config.interpreter, api_key) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "Interpreter unavailable — storing dream without analysis");
            return DreamAnalysis::default();
        }
    };

    match client.analyze(content).await {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(error = %e, "Interpretation failed — storing dream without analysis");
            DreamAnalysis::default()
        }
    }
}

/// Newest-first listing of a user's dreams.
pub async fn list_dreams(
    user_id: &str,
    limit: Option<u32>,
    pool: &PgPool,
) -> Result<Vec<DreamRecord>, OneiricError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(OneiricError::Validation("user_id is required".to_string()));
    }

    let limit = limit
        .map(|l| (l as i64).clamp(1, MAX_LIST_LIMIT))
        .unwrap_or(DEFAULT_LIST_LIMIT);

    let dreams: Vec<DreamRecord> = sqlx::query_as(
        r#"
        SELECT id, user_id, content, interpretation, symbols, emotions, themes, sleep_hours, created_at
        FROM dreams
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(dreams)
}

/// Fetch one dream by id.
pub async fn get_dream(id: Uuid, pool: &PgPool) -> Result<DreamRecord, OneiricError> {
    let dream: Option<DreamRecord> = sqlx::query_as(
        r#"
        SELECT id, user_id, content, interpretation, symbols, emotions, themes, sleep_hours, created_at
        FROM dreams
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    dream.ok_or_else(|| OneiricError::NotFound(format!("Dream {} not found", id)))
}
