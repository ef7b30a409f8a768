//! oneiric-cli — command-line frontend for the Oneiric dream journal API
//!
//! # Subcommands
//! - `log <content> [--sleep <hours>]` — log a dream entry
//! - `list [-n <limit>]`               — list recent dreams
//! - `similar <dream-id> [-n <limit>]` — dreams similar to a given one
//! - `patterns`                        — symbol/emotion/theme summary
//! - `profile`                         — XP, streak and achievements
//! - `status`                          — show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8790";
const DEFAULT_LIMIT: usize = 5;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "oneiric-cli",
    version,
    about = "Oneiric dream journal — log, explore and compare your dreams"
)]
struct Cli {
    /// Oneiric HTTP server URL (overrides ONEIRIC_HTTP_URL env var)
    #[arg(long, env = "ONEIRIC_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// User identifier (overrides ONEIRIC_USER env var)
    #[arg(long, env = "ONEIRIC_USER", default_value = "default")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log a dream entry
    Log {
        /// Free-text dream content
        content: String,

        /// Hours slept before this dream
        #[arg(long)]
        sleep: Option<f64>,
    },

    /// List recent dreams, newest first
    List {
        /// Maximum number of dreams to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Dreams similar to the given one
    Similar {
        /// Dream id (UUID)
        dream_id: String,

        /// Maximum number of matches to return
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Symbol/emotion/theme frequencies and sleep statistics
    Patterns,

    /// XP, streak and achievements
    Profile,

    /// Show Oneiric server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DreamItem {
    pub id: String,
    pub content: String,
    pub interpretation: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SimilarItem {
    pub id: String,
    pub content: String,
    pub similarity_score: f64,
}

#[derive(Debug, Deserialize)]
pub struct LabelCountItem {
    pub label: String,
    pub count: u64,
}

// ============================================================================
// Output formatting
// ============================================================================

/// One listing line: short id, date and a content preview.
pub fn format_dream_line(d: &DreamItem) -> String {
    let short_id: String = d.id.replace('-', "").chars().take(8).collect();
    let date: String = d.created_at.chars().take(10).collect();
    format!("{}  {}  {}", short_id, date, preview(&d.content, 60))
}

/// One similarity line: percentage score plus a content preview.
pub fn format_similar_line(s: &SimilarItem) -> String {
    format!("{:>5.1}%  {}", s.similarity_score * 100.0, preview(&s.content, 60))
}

/// Frequency table rows, `label count` aligned.
pub fn format_label_counts(entries: &[LabelCountItem]) -> Vec<String> {
    entries
        .iter()
        .map(|e| format!("  {:<20} {}", e.label, e.count))
        .collect()
}

fn preview(content: &str, max_chars: usize) -> String {
    let first_line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn http_client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()?)
}

fn fail_on_error_status(resp: reqwest::blocking::Response) -> reqwest::blocking::Response {
    if !resp.status().is_success() {
        let status = resp.status();
        let body: serde_json::Value = resp.json().unwrap_or_default();
        let msg = body["error"].as_str().unwrap_or("unknown error");
        eprintln!("oneiric-cli: server returned {}: {}", status, msg);
        std::process::exit(1);
    }
    resp
}

fn do_log(server: &str, user: &str, content: &str, sleep: Option<f64>) -> anyhow::Result<()> {
    let client = http_client()?;
    let body = serde_json::json!({
        "user_id": user,
        "content": content,
        "sleep_hours": sleep,
    });

    let resp = match client.post(format!("{}/dreams", server)).json(&body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("oneiric-cli: connection failed to {}/dreams: {}", server, e);
            std::process::exit(1);
        }
    };
    let resp = fail_on_error_status(resp);

    let body: serde_json::Value = resp.json()?;
    let dream = &body["dream"];
    println!("Logged dream {}", dream["id"].as_str().unwrap_or("?"));

    let interpretation = dream["interpretation"].as_str().unwrap_or("");
    if interpretation.is_empty() {
        println!("(interpretation pending — the analysis service was unavailable)");
    } else {
        println!("\n{}", interpretation);
    }

    Ok(())
}

fn do_list(server: &str, user: &str, limit: usize) -> anyhow::Result<()> {
    let client = http_client()?;
    let resp = client
        .get(format!("{}/dreams", server))
        .query(&[("user_id", user), ("limit", &limit.to_string())])
        .send()?;
    let resp = fail_on_error_status(resp);

    let body: serde_json::Value = resp.json()?;
    let dreams: Vec<DreamItem> = serde_json::from_value(body["dreams"].clone())?;

    if dreams.is_empty() {
        eprintln!("No dreams logged yet.");
        return Ok(());
    }

    for d in &dreams {
        println!("{}", format_dream_line(d));
    }

    Ok(())
}

fn do_similar(server: &str, dream_id: &str, limit: usize) -> anyhow::Result<()> {
    let client = http_client()?;
    let resp = client
        .get(format!("{}/dreams/{}/similar", server, dream_id))
        .query(&[("limit", &limit.to_string())])
        .send()?;
    let resp = fail_on_error_status(resp);

    let body: serde_json::Value = resp.json()?;
    let results: Vec<SimilarItem> = serde_json::from_value(body["results"].clone())?;

    if results.is_empty() {
        eprintln!("No similar dreams found.");
        return Ok(());
    }

    for s in &results {
        println!("{}", format_similar_line(s));
    }

    Ok(())
}

fn do_patterns(server: &str, user: &str) -> anyhow::Result<()> {
    let client = http_client()?;
    let resp = client
        .get(format!("{}/patterns", server))
        .query(&[("user_id", user)])
        .send()?;
    let resp = fail_on_error_status(resp);

    let body: serde_json::Value = resp.json()?;

    println!("Total dreams: {}", body["total_dreams"]);
    println!(
        "Last 7 days: {}   Last 30 days: {}",
        body["dreams_last_7_days"], body["dreams_last_30_days"]
    );

    for (title, key) in [
        ("Symbols", "top_symbols"),
        ("Emotions", "top_emotions"),
        ("Themes", "top_themes"),
    ] {
        let entries: Vec<LabelCountItem> =
            serde_json::from_value(body[key].clone()).unwrap_or_default();
        if !entries.is_empty() {
            println!("\n{}:", title);
            for line in format_label_counts(&entries) {
                println!("{}", line);
            }
        }
    }

    let sleep = &body["sleep"];
    println!(
        "\nSleep: avg {:.1}h  min {:.1}h  max {:.1}h",
        sleep["average"].as_f64().unwrap_or(0.0),
        sleep["min"].as_f64().unwrap_or(0.0),
        sleep["max"].as_f64().unwrap_or(0.0)
    );

    Ok(())
}

fn do_profile(server: &str, user: &str) -> anyhow::Result<()> {
    let client = http_client()?;
    let resp = client
        .get(format!("{}/profile", server))
        .query(&[("user_id", user)])
        .send()?;
    let resp = fail_on_error_status(resp);

    let body: serde_json::Value = resp.json()?;
    println!(
        "Level {}  ({} XP)  —  streak {} (best {})",
        body["level"], body["xp"], body["current_streak"], body["longest_streak"]
    );

    if let Some(achievements) = body["achievements"].as_array() {
        if !achievements.is_empty() {
            println!("\nAchievements:");
            for a in achievements {
                println!("  ★ {}", a["name"].as_str().unwrap_or("?"));
            }
        }
    }

    Ok(())
}

fn do_status(server: &str) -> anyhow::Result<()> {
    let client = http_client()?;
    let resp = client.get(format!("{}/health", server)).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Oneiric server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:        {}", body["version"].as_str().unwrap_or("?"));
            println!("PostgreSQL:     {}", body["postgresql"].as_str().unwrap_or("?"));
            println!("pgvector:       {}", body["pgvector"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("oneiric-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("oneiric-cli: cannot reach {}/health — {}", server, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Log { content, sleep } => do_log(&server, &cli.user, &content, sleep),
        Commands::List { limit } => do_list(&server, &cli.user, limit),
        Commands::Similar { dream_id, limit } => do_similar(&server, &dream_id, limit),
        Commands::Patterns => do_patterns(&server, &cli.user),
        Commands::Profile => do_profile(&server, &cli.user),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("oneiric-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_dream(id: &str, content: &str, created_at: &str) -> DreamItem {
        DreamItem {
            id: id.to_string(),
            content: content.to_string(),
            interpretation: String::new(),
            symbols: vec![],
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_dream_line_has_short_id_and_date() {
        let d = mock_dream(
            "7b5c24ab-1234-5678-9abc-def012345678",
            "I was flying",
            "2026-03-15T08:30:00Z",
        );
        let line = format_dream_line(&d);

        assert!(line.starts_with("7b5c24ab"), "got: {}", line);
        assert!(line.contains("2026-03-15"));
        assert!(line.ends_with("I was flying"));
    }

    #[test]
    fn test_dream_line_preview_truncated() {
        let long = "A".repeat(100);
        let d = mock_dream("aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee", &long, "2026-03-15");
        let line = format_dream_line(&d);

        assert!(line.ends_with("..."));
        assert!(line.contains(&"A".repeat(60)));
        assert!(!line.contains(&"A".repeat(61)));
    }

    #[test]
    fn test_dream_line_preview_uses_first_nonempty_line() {
        let d = mock_dream(
            "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee",
            "\n\nFirst real line\nSecond line",
            "2026-03-15",
        );
        assert!(format_dream_line(&d).ends_with("First real line"));
    }

    #[test]
    fn test_similar_line_formats_score_as_percent() {
        let s = SimilarItem {
            id: "x".to_string(),
            content: "the glass city again".to_string(),
            similarity_score: 0.874,
        };
        let line = format_similar_line(&s);

        assert!(line.contains("87.4%"), "got: {}", line);
        assert!(line.ends_with("the glass city again"));
    }

    #[test]
    fn test_label_counts_alignment() {
        let entries = vec![
            LabelCountItem { label: "flying".to_string(), count: 12 },
            LabelCountItem { label: "water".to_string(), count: 7 },
        ];
        let lines = format_label_counts(&entries);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("flying"));
        assert!(lines[0].ends_with("12"));
        assert!(lines[1].ends_with('7'));
    }
}
