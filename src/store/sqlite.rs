//! SQLite-backed [`AlertStore`].
//!
//! Uses the `alerts` and `ingest_runs` tables created by
//! [`crate::migrate`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{AlertRecord, NewAlert, RunSummary, SummaryState, PENDING_SUMMARY};

use super::{AlertStore, InsertOutcome};

const ALERT_COLUMNS: &str = "id, identity_key, title, summary, summary_state, url, \
     bulletin_date, region, source, content, created_at";

pub struct SqliteAlertStore {
    pool: SqlitePool,
}

impl SqliteAlertStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_record(row: &SqliteRow) -> Result<AlertRecord> {
    let state: String = row.get("summary_state");
    let summary_state = SummaryState::parse(&state)
        .ok_or_else(|| anyhow!("unknown summary_state '{}' in alerts table", state))?;

    Ok(AlertRecord {
        id: row.get("id"),
        identity_key: row.get("identity_key"),
        title: row.get("title"),
        summary: row.get("summary"),
        summary_state,
        url: row.get("url"),
        date: row.get("bulletin_date"),
        region: row.get("region"),
        source: row.get("source"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl AlertStore for SqliteAlertStore {
    async fn find_by_key(&self, identity_key: &str) -> Result<Option<AlertRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM alerts WHERE identity_key = ?",
            ALERT_COLUMNS
        ))
        .bind(identity_key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn insert(&self, alert: &NewAlert) -> Result<InsertOutcome> {
        let record = AlertRecord {
            id: uuid::Uuid::new_v4().to_string(),
            identity_key: alert.identity_key.clone(),
            title: alert.title.clone(),
            summary: PENDING_SUMMARY.to_string(),
            summary_state: SummaryState::Pending,
            url: alert.url.clone(),
            date: alert.date.clone(),
            region: alert.region.clone(),
            source: alert.source.to_string(),
            content: alert.content.clone(),
            created_at: chrono::Utc::now().timestamp(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO alerts (id, identity_key, title, summary, summary_state, url,
                                bulletin_date, region, source, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.identity_key)
        .bind(&record.title)
        .bind(&record.summary)
        .bind(record.summary_state.as_str())
        .bind(&record.url)
        .bind(&record.date)
        .bind(&record.region)
        .bind(&record.source)
        .bind(&record.content)
        .bind(record.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted(record)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(InsertOutcome::AlreadyPresent)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn pending(&self, limit: i64) -> Result<Vec<AlertRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM alerts WHERE summary_state = ? ORDER BY created_at ASC, rowid ASC LIMIT ?",
            ALERT_COLUMNS
        ))
        .bind(SummaryState::Pending.as_str())
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn record_run(&self, summary: &RunSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ingest_runs (id, source, bulletin_date, documents_found, total_candidates,
                                     inserted_new, duplicates, errors, skipped_invalid_document,
                                     skipped_by_filter, duration_ms, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&summary.source)
        .bind(&summary.date)
        .bind(summary.documents_found as i64)
        .bind(summary.total_candidates as i64)
        .bind(summary.inserted_new as i64)
        .bind(summary.duplicates as i64)
        .bind(summary.errors as i64)
        .bind(summary.skipped_invalid_document as i64)
        .bind(summary.skipped_by_filter as i64)
        .bind(summary.duration_ms as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
