//! Pending-alert hand-off listing.
//!
//! The summarization stage consumes `pending` records in bounded batches.
//! This module exposes that read for `gazette alerts pending` and
//! `GET /alerts/pending`.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::AlertRecord;
use crate::store::{AlertStore, SqliteAlertStore};

pub const DEFAULT_PENDING_LIMIT: i64 = 50;
pub const MAX_PENDING_LIMIT: i64 = 500;

/// Core listing function returning structured data (used by CLI and server).
pub async fn list_pending(config: &Config, limit: i64) -> Result<Vec<AlertRecord>> {
    if !(1..=MAX_PENDING_LIMIT).contains(&limit) {
        bail!("limit must be between 1 and {}", MAX_PENDING_LIMIT);
    }

    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let store = SqliteAlertStore::new(pool.clone());
    let records = store.pending(limit).await?;
    pool.close().await;

    Ok(records)
}

/// CLI entry point for `gazette alerts pending`.
pub async fn run_pending(config: &Config, limit: i64, json: bool) -> Result<()> {
    let records = list_pending(config, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No pending alerts.");
        return Ok(());
    }

    for record in &records {
        println!("--- {} ---", record.id);
        println!("source: {} ({})", record.source, record.region);
        println!("date: {}", record.date);
        println!("title: {}", record.title);
        println!("url: {}", record.url);
        println!();
    }
    println!("{} pending alert(s)", records.len());

    Ok(())
}
