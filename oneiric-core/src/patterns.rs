//! Pattern aggregation — descriptive summaries over a user's dream journal
//!
//! Pure computation over already-fetched records: frequency-ranked
//! symbol/emotion/theme tables, sleep statistics, recency window counts and
//! a sleep chart. No I/O, no clock reads (the reference instant is a
//! parameter) and no error path — every edge case is a defined return value.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::DreamRecord;

/// Entries kept per frequency-ranked category.
const TOP_LABELS: usize = 10;

/// Sleep-chart window: most recent records with sleep data.
const CHART_POINTS: usize = 30;

/// Content preview length for chart points, in characters.
const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepChartPoint {
    /// Calendar date label, `%Y-%m-%d`.
    pub date: String,
    pub hours: f64,
    /// At most 50 characters of content, with a trailing ellipsis when cut.
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DreamPatterns {
    pub total_dreams: u64,
    pub top_symbols: Vec<LabelCount>,
    pub top_emotions: Vec<LabelCount>,
    pub top_themes: Vec<LabelCount>,
    pub dreams_last_7_days: u64,
    pub dreams_last_30_days: u64,
    pub sleep: SleepStats,
    pub sleep_chart: Vec<SleepChartPoint>,
}

/// Frequency table that remembers first-encounter order, so that the
/// descending-count sort has a deterministic tie-break: labels with equal
/// counts rank in the order they were first seen in the input.
#[derive(Default)]
struct FrequencyTable {
    counts: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl FrequencyTable {
    fn bump(&mut self, label: &str) {
        match self.index.get(label) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(label.to_string(), self.counts.len());
                self.counts.push((label.to_string(), 1));
            }
        }
    }

    fn top(mut self, k: usize) -> Vec<LabelCount> {
        // Stable sort: equal counts keep encounter order.
        self.counts.sort_by(|a, b| b.1.cmp(&a.1));
        self.counts
            .into_iter()
            .take(k)
            .map(|(label, count)| LabelCount { label, count })
            .collect()
    }
}

/// Summarize a user's dream records relative to the reference instant `now`.
///
/// Input order does not matter: aggregation is order-independent, and the
/// sleep chart sorts its own window internally. Empty input yields an
/// all-zero/empty summary, never an error.
pub fn aggregate_patterns(dreams: &[DreamRecord], now: DateTime<Utc>) -> DreamPatterns {
    let mut symbols = FrequencyTable::default();
    let mut emotions = FrequencyTable::default();
    let mut themes = FrequencyTable::default();

    for dream in dreams {
        for s in &dream.symbols {
            symbols.bump(s);
        }
        for e in &dream.emotions {
            emotions.bump(e);
        }
        for t in &dream.themes {
            themes.bump(t);
        }
    }

    let week_ago = now - Duration::days(7);
    let month_ago = now - Duration::days(30);
    let dreams_last_7_days = dreams.iter().filter(|d| d.created_at > week_ago).count() as u64;
    let dreams_last_30_days = dreams.iter().filter(|d| d.created_at > month_ago).count() as u64;

    DreamPatterns {
        total_dreams: dreams.len() as u64,
        top_symbols: symbols.top(TOP_LABELS),
        top_emotions: emotions.top(TOP_LABELS),
        top_themes: themes.top(TOP_LABELS),
        dreams_last_7_days,
        dreams_last_30_days,
        sleep: sleep_stats(dreams),
        sleep_chart: sleep_chart(dreams),
    }
}

fn sleep_stats(dreams: &[DreamRecord]) -> SleepStats {
    let hours: Vec<f64> = dreams.iter().filter_map(|d| d.sleep_hours).collect();
    if hours.is_empty() {
        // No sleep data is a valid state, not an error.
        return SleepStats {
            average: 0.0,
            min: 0.0,
            max: 0.0,
        };
    }

    let sum: f64 = hours.iter().sum();
    let min = hours.iter().copied().fold(f64::INFINITY, f64::min);
    let max = hours.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    SleepStats {
        average: sum / hours.len() as f64,
        min,
        max,
    }
}

fn sleep_chart(dreams: &[DreamRecord]) -> Vec<SleepChartPoint> {
    let mut with_sleep: Vec<&DreamRecord> =
        dreams.iter().filter(|d| d.sleep_hours.is_some()).collect();

    // Most recent first, window of CHART_POINTS, then back to chronological.
    with_sleep.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    with_sleep.truncate(CHART_POINTS);
    with_sleep.reverse();

    with_sleep
        .into_iter()
        .map(|d| SleepChartPoint {
            date: d.created_at.format("%Y-%m-%d").to_string(),
            hours: d.sleep_hours.unwrap_or(0.0),
            preview: preview(&d.content),
        })
        .collect()
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        content.to_string()
    } else {
        let cut: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}

// ============================================================================
// TESTS
// ============================================================================
