//! Embedder subsystem — populates the vector column in dream_embeddings
//!
//! Embedding runs in `tokio::spawn` AFTER the HTTP response is sent — it
//! never blocks the caller. A periodic backfill worker sweeps up rows whose
//! vector is still NULL (fallback mode, crashes, key rotation).

use oneiric_core::embeddings::{
    EmbeddingBackend, EmbeddingClientConfig, EmbeddingError, FallbackEmbeddingClient,
    GeminiEmbeddingClient,
};
use oneiric_core::config::EmbeddingConfig;
use oneiric_core::OneiricConfig;
use pgvector::Vector;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use uuid::Uuid;

/// Create an embedding backend from the application config.
///
/// `fallback_to_none = true` wraps the client so API failures store the
/// dream without a vector instead of erroring.
pub fn create_backend_from_config(
    config: &OneiricConfig,
) -> Result<Box<dyn EmbeddingBackend>, EmbeddingError> {
    let client_config = EmbeddingClientConfig::new(
        None,
        config.embedding.model.clone(),
        config.embedding.dimensions as usize,
    );

    if config.embedding.fallback_to_none {
        Ok(Box::new(FallbackEmbeddingClient::new(client_config)?))
    } else {
        Ok(Box::new(GeminiEmbeddingClient::new(client_config)?))
    }
}

/// Embed a single dream by id using the provided backend.
///
/// Returns Ok(true) if a vector was written (or the backend deferred in
/// fallback mode), Ok(false) if the row already had one and `force` is off.
pub async fn embed_dream_by_id(
    id: Uuid,
    pool: &PgPool,
    backend: &dyn EmbeddingBackend,
    force: bool,
) -> anyhow::Result<bool> {
    let row: Option<(String, Option<Vector>)> = sqlx::query_as(
        r#"
        SELECT d.content, e.embedding
        FROM dreams d
        LEFT JOIN dream_embeddings e ON e.dream_id = d.id
        WHERE d.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let (content, existing) = row.ok_or_else(|| anyhow::anyhow!("Dream {} not found", id))?;

    if existing.is_some() && !force {
        tracing::debug!(id = %id, "Vector already populated, skipping");
        return Ok(false);
    }

    match backend.embed(&content).await {
        Ok(Some(embedding)) => {
            let vector = Vector::from(embedding);
            // Replacement is wholesale: regeneration overwrites both the
            // vector and the model name.
            sqlx::query(
                r#"
                INSERT INTO dream_embeddings (dream_id, embedding, model_name)
                VALUES ($1, $2, $3)
                ON CONFLICT (dream_id)
                DO UPDATE SET embedding = EXCLUDED.embedding, model_name = EXCLUDED.model_name
                "#,
            )
            .bind(id)
            .bind(&vector)
            .bind(backend.model_name())
            .execute(pool)
            .await?;
            tracing::info!(id = %id, model = backend.model_name(), "Dream embedded");
            Ok(true)
        }
        Ok(None) => {
            // Fallback mode: embedding unavailable, leave the vector NULL
            // for the backfill worker.
            tracing::info!(id = %id, "Embedding unavailable — left for backfill");
            Ok(true)
        }
        Err(e) => {
            tracing::error!(id = %id, error = %e, "Failed to generate embedding");
            Err(e.into())
        }
    }
}

/// Spawn an async task to embed a dream using the configured backend.
pub fn spawn_embed_task(id: Uuid, pool: PgPool, config: OneiricConfig) {
    tokio::spawn(async move {
        let backend = match create_backend_from_config(&config) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(id = %id, error = %e, "Failed to create embedding backend");
                return;
            }
        };

        match embed_dream_by_id(id, &pool, backend.as_ref(), false).await {
            Ok(true) => tracing::debug!(id = %id, "Background embedding completed"),
            Ok(false) => tracing::debug!(id = %id, "Background embedding skipped"),
            Err(e) => tracing::error!(id = %id, error = %e, "Background embedding failed"),
        }
    });
}

/// Run the background backfill worker loop.
///
/// Spawned from `main.rs`. Exits immediately when disabled via config.
pub async fn run_backfill_worker(
    pool: PgPool,
    backend: Arc<dyn EmbeddingBackend>,
    config: EmbeddingConfig,
) {
    if !config.backfill_enabled {
        tracing::info!("Embedding backfill worker disabled via config");
        return;
    }

    let mut ticker = interval(Duration::from_secs(config.backfill_interval_minutes * 60));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_min = config.backfill_interval_minutes,
        batch_size = config.backfill_batch_size,
        "Embedding backfill worker started"
    );

    loop {
        ticker.tick().await;

        match run_backfill_tick(&pool, backend.as_ref(), &config).await {
            Ok((embedded, skipped)) => {
                if embedded > 0 || skipped > 0 {
                    tracing::info!(embedded, skipped, "Backfill tick complete");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Backfill tick failed");
            }
        }
    }
}

/// A single backfill tick. Returns `(embedded, skipped)`.
///
/// Public for unit testing.
pub async fn run_backfill_tick(
    pool: &PgPool,
    backend: &dyn EmbeddingBackend,
    config: &EmbeddingConfig,
) -> anyhow::Result<(usize, usize)> {
    let rows: Vec<(Uuid, String)> = sqlx::query_as(
        r#"
        SELECT d.id, d.content
        FROM dreams d
        LEFT JOIN dream_embeddings e ON e.dream_id = d.id
        WHERE e.embedding IS NULL
        ORDER BY d.created_at ASC
        LIMIT $1
        "#,
    )
    .bind(config.backfill_batch_size as i64)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Ok((0, 0));
    }

    tracing::debug!(pending = rows.len(), "Found dreams without vectors, starting backfill");

    let mut embedded = 0usize;
    let mut skipped = 0usize;
    let total = rows.len();

    for (processed, (id, content)) in rows.into_iter().enumerate() {
        match backend.embed(&content).await {
            Ok(Some(vec)) => {
                let vector = Vector::from(vec);
                sqlx::query(
                    r#"
                    INSERT INTO dream_embeddings (dream_id, embedding, model_name)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (dream_id)
                    DO UPDATE SET embedding = EXCLUDED.embedding, model_name = EXCLUDED.model_name
                    "#,
                )
                .bind(id)
                .bind(&vector)
                .bind(backend.model_name())
                .execute(pool)
                .await?;
                embedded += 1;
            }
            Ok(None) => {
                // Backend still in fallback mode — stop the batch. This row
                // and everything after it counts as skipped; rows that
                // already errored are in `skipped` from their own arm.
                tracing::debug!("Backend returned None during backfill — stopping batch");
                skipped += total - processed;
                return Ok((embedded, skipped));
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Failed to backfill embedding, skipping row");
                skipped += 1;
            }
        }
    }

    Ok((embedded, skipped))
}
