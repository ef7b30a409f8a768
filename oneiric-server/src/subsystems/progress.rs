//! Progress subsystem — XP, streak and achievement state per user
//!
//! The arithmetic lives in `oneiric_core::gamify`; this module owns the
//! `user_profiles` reads and writes around it.

use chrono::NaiveDate;
use oneiric_core::gamify::{advance_streak, level_for_xp, unlocked, Achievement};
use oneiric_core::models::UserProfile;
use oneiric_core::OneiricError;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Serialize)]
pub struct ProfileSummary {
    pub user_id: String,
    pub xp: i64,
    pub level: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_dreams: i64,
    pub achievements: Vec<Achievement>,
}

/// Apply one journal entry to the user's profile and persist the result.
pub async fn record_entry(
    pool: &PgPool,
    user_id: &str,
    entry_date: NaiveDate,
    xp_award: i64,
) -> Result<UserProfile, OneiricError> {
    let existing: Option<UserProfile> = sqlx::query_as(
        r#"
        SELECT user_id, xp, current_streak, longest_streak, last_entry_date, total_dreams
        FROM user_profiles
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let (prev_xp, prev_streak, prev_longest, prev_last, prev_total) = match &existing {
        Some(p) => (
            p.xp,
            p.current_streak,
            p.longest_streak,
            p.last_entry_date,
            p.total_dreams,
        ),
        None => (0, 0, 0, None, 0),
    };

    let streak = advance_streak(prev_last, entry_date, prev_streak.max(0) as u32) as i32;
    let longest = prev_longest.max(streak);

    let updated: UserProfile = sqlx::query_as(
        r#"
        INSERT INTO user_profiles (user_id, xp, current_streak, longest_streak, last_entry_date, total_dreams)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id)
        DO UPDATE SET
            xp = EXCLUDED.xp,
            current_streak = EXCLUDED.current_streak,
            longest_streak = EXCLUDED.longest_streak,
            last_entry_date = EXCLUDED.last_entry_date,
            total_dreams = EXCLUDED.total_dreams
        RETURNING user_id, xp, current_streak, longest_streak, last_entry_date, total_dreams
        "#,
    )
    .bind(user_id)
    .bind(prev_xp + xp_award)
    .bind(streak)
    .bind(longest)
    .bind(entry_date)
    .bind(prev_total + 1)
    .fetch_one(pool)
    .await?;

    tracing::debug!(
        user_id = %user_id,
        xp = updated.xp,
        streak = updated.current_streak,
        "Progress updated"
    );

    Ok(updated)
}

/// Profile summary for the API. Unknown users get a zero-valued block —
/// empty is valid, not an error.
pub async fn profile_summary(
    pool: &PgPool,
    user_id: &str,
) -> Result<ProfileSummary, OneiricError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(OneiricError::Validation("user_id is required".to_string()));
    }

    let profile: Option<UserProfile> = sqlx::query_as(
        r#"
        SELECT user_id, xp, current_streak, longest_streak, last_entry_date, total_dreams
        FROM user_profiles
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let (xp, current_streak, longest_streak, total_dreams) = match &profile {
        Some(p) => (p.xp, p.current_streak, p.longest_streak, p.total_dreams),
        None => (0, 0, 0, 0),
    };

    Ok(ProfileSummary {
        user_id: user_id.to_string(),
        xp,
        level: level_for_xp(xp),
        current_streak,
        longest_streak,
        total_dreams,
        achievements: unlocked(total_dreams.max(0) as u64, longest_streak.max(0) as u32),
    })
}
