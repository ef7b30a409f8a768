//! Engagement bookkeeping — XP, streaks and achievements
//!
//! Same discipline as the other computation units: pure arithmetic over
//! values the caller already holds, with no error path. The progress
//! subsystem owns reading and writing `user_profiles`.

use chrono::NaiveDate;
use serde::Serialize;

/// XP needed per level. Level 1 starts at 0 XP.
const XP_PER_LEVEL: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Achievement {
    pub code: &'static str,
    pub name: &'static str,
}

/// Static catalogue; thresholds are over lifetime totals so achievements
/// never regress once earned.
const ACHIEVEMENTS: &[(u64, u32, Achievement)] = &[
    (1, 0, Achievement { code: "first_dream", name: "First Dream" }),
    (10, 0, Achievement { code: "ten_dreams", name: "Dedicated Dreamer" }),
    (50, 0, Achievement { code: "fifty_dreams", name: "Dream Archivist" }),
    (0, 3, Achievement { code: "streak_3", name: "Three in a Row" }),
    (0, 7, Achievement { code: "streak_7", name: "Week of Dreams" }),
    (0, 30, Achievement { code: "streak_30", name: "Lucid Month" }),
];

/// Level derived from total XP.
pub fn level_for_xp(xp: i64) -> i64 {
    xp.max(0) / XP_PER_LEVEL + 1
}

/// Advance a daily streak given the previous entry date.
///
/// Same-day entries leave the streak untouched, a consecutive-day entry
/// extends it, anything else (including the first entry ever) restarts at 1.
pub fn advance_streak(last_entry: Option<NaiveDate>, today: NaiveDate, current: u32) -> u32 {
    match last_entry {
        Some(last) if last == today => current.max(1),
        Some(last) if last.succ_opt() == Some(today) => current + 1,
        _ => 1,
    }
}

/// Achievements earned with the given lifetime totals.
pub fn unlocked(total_dreams: u64, longest_streak: u32) -> Vec<Achievement> {
    ACHIEVEMENTS
        .iter()
        .filter(|(dreams, streak, _)| total_dreams >= *dreams && longest_streak >= *streak)
        .map(|(_, _, a)| a.clone())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(250), 3);
        assert_eq!(level_for_xp(-5), 1);
    }

    #[test]
    fn test_first_entry_starts_streak_at_one() {
        assert_eq!(advance_streak(None, date(2026, 3, 15), 0), 1);
    }

    #[test]
    fn test_same_day_entry_keeps_streak() {
        let today = date(2026, 3, 15);
        assert_eq!(advance_streak(Some(today), today, 4), 4);
    }

    #[test]
    fn test_consecutive_day_extends_streak() {
        assert_eq!(advance_streak(Some(date(2026, 3, 14)), date(2026, 3, 15), 4), 5);
    }

    #[test]
    fn test_gap_resets_streak() {
        assert_eq!(advance_streak(Some(date(2026, 3, 10)), date(2026, 3, 15), 9), 1);
    }

    #[test]
    fn test_streak_extends_across_month_boundary() {
        assert_eq!(advance_streak(Some(date(2026, 2, 28)), date(2026, 3, 1), 2), 3);
    }

    #[test]
    fn test_no_achievements_before_first_dream() {
        assert!(unlocked(0, 0).is_empty());
    }

    #[test]
    fn test_first_dream_achievement() {
        let earned = unlocked(1, 1);
        assert!(earned.iter().any(|a| a.code == "first_dream"));
        assert!(!earned.iter().any(|a| a.code == "ten_dreams"));
    }

    #[test]
    fn test_streak_achievements_use_longest_streak() {
        let earned = unlocked(5, 7);
        assert!(earned.iter().any(|a| a.code == "streak_3"));
        assert!(earned.iter().any(|a| a.code == "streak_7"));
        assert!(!earned.iter().any(|a| a.code == "streak_30"));
    }

    #[test]
    fn test_all_achievements_at_high_totals() {
        assert_eq!(unlocked(100, 40).len(), ACHIEVEMENTS.len());
    }
}
