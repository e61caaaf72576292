//! Store statistics.
//!
//! Counts of alerts per source and summary state, plus the last recorded
//! run per source. Used by `gazette stats` to check that daily runs are
//! landing and that the summarization stage is keeping up.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::SummaryState;

/// Per-source breakdown of alert states and the latest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub source: String,
    pub pending: i64,
    pub summarized: i64,
    pub not_relevant: i64,
    pub reviewed: i64,
    pub last_run: Option<LastRun>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastRun {
    pub bulletin_date: String,
    pub inserted_new: i64,
    pub errors: i64,
    pub finished_at: i64,
}

impl SourceStats {
    pub fn total(&self) -> i64 {
        self.pending + self.summarized + self.not_relevant + self.reviewed
    }
}

/// Collect per-source stats, ordered by source tag.
pub async fn collect_stats(pool: &SqlitePool) -> Result<Vec<SourceStats>> {
    let state_rows = sqlx::query(
        "SELECT source, summary_state, COUNT(*) AS n FROM alerts GROUP BY source, summary_state",
    )
    .fetch_all(pool)
    .await?;

    // Latest run per source
    let run_rows = sqlx::query(
        r#"
        SELECT r.source, r.bulletin_date, r.inserted_new, r.errors, r.finished_at
        FROM ingest_runs r
        WHERE r.rowid = (
            SELECT r2.rowid FROM ingest_runs r2
            WHERE r2.source = r.source
            ORDER BY r2.finished_at DESC, r2.rowid DESC
            LIMIT 1
        )
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut stats: Vec<SourceStats> = Vec::new();
    let entry = |stats: &mut Vec<SourceStats>, source: &str| -> usize {
        match stats.iter().position(|s| s.source == source) {
            Some(idx) => idx,
            None => {
                stats.push(SourceStats {
                    source: source.to_string(),
                    ..Default::default()
                });
                stats.len() - 1
            }
        }
    };

    for row in &state_rows {
        let source: String = row.get("source");
        let state: String = row.get("summary_state");
        let n: i64 = row.get("n");
        let idx = entry(&mut stats, &source);
        let s = &mut stats[idx];
        match SummaryState::parse(&state) {
            Some(SummaryState::Pending) => s.pending += n,
            Some(SummaryState::Summarized) => s.summarized += n,
            Some(SummaryState::NotRelevant) => s.not_relevant += n,
            Some(SummaryState::Reviewed) => s.reviewed += n,
            None => {}
        }
    }

    for row in &run_rows {
        let source: String = row.get("source");
        let idx = entry(&mut stats, &source);
        stats[idx].last_run = Some(LastRun {
            bulletin_date: row.get("bulletin_date"),
            inserted_new: row.get("inserted_new"),
            errors: row.get("errors"),
            finished_at: row.get("finished_at"),
        });
    }

    stats.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(stats)
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;

    let stats = collect_stats(&pool).await?;
    let total: i64 = stats.iter().map(SourceStats::total).sum();
    let pending: i64 = stats.iter().map(|s| s.pending).sum();

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Rural Gazette Store Stats");
    println!("=========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Alerts:      {}", total);
    println!("  Pending:     {}", pending);

    if !stats.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<8} {:>8} {:>10} {:>8} {:>8}   {}",
            "SOURCE", "PENDING", "SUMMARIZED", "IGNORED", "REVIEWED", "LAST RUN"
        );
        println!("  {}", "-".repeat(76));

        for s in &stats {
            let run_display = match &s.last_run {
                Some(run) => format!(
                    "{} (+{}, {} errors, {})",
                    run.bulletin_date,
                    run.inserted_new,
                    run.errors,
                    format_ts_relative(run.finished_at)
                ),
                None => "never".to_string(),
            };
            println!(
                "  {:<8} {:>8} {:>10} {:>8} {:>8}   {}",
                s.source, s.pending, s.summarized, s.not_relevant, s.reviewed, run_display
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
