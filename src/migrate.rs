use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the schema if missing. Safe to run any number of times.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Alerts handed to the summarization stage. identity_key is the dedup backstop.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id TEXT PRIMARY KEY,
            identity_key TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            summary TEXT NOT NULL,
            summary_state TEXT NOT NULL DEFAULT 'pending',
            url TEXT NOT NULL,
            bulletin_date TEXT NOT NULL,
            region TEXT NOT NULL,
            source TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per finished ingestion run
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingest_runs (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            bulletin_date TEXT NOT NULL,
            documents_found INTEGER NOT NULL,
            total_candidates INTEGER NOT NULL,
            inserted_new INTEGER NOT NULL,
            duplicates INTEGER NOT NULL,
            errors INTEGER NOT NULL,
            skipped_invalid_document INTEGER NOT NULL,
            skipped_by_filter INTEGER NOT NULL,
            duration_ms INTEGER NOT NULL,
            finished_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_alerts_state_created ON alerts(summary_state, created_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_alerts_source ON alerts(source)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ingest_runs_source ON ingest_runs(source, finished_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
