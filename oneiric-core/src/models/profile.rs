use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: String,
    pub xp: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_entry_date: Option<NaiveDate>,
    pub total_dreams: i64,
}
