use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single journal entry. Immutable after creation except for the
/// AI-derived fields (interpretation, symbols, emotions, themes), which are
/// populated once at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DreamRecord {
    pub id: Uuid,
    pub user_id: String,
    pub content: String,
    pub interpretation: String,
    pub symbols: Vec<String>,
    pub emotions: Vec<String>,
    pub themes: Vec<String>,
    pub sleep_hours: Option<f64>,
    pub created_at: DateTime<Utc>,
}
