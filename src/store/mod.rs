//! Dedup & persistence gate.
//!
//! The [`AlertStore`] trait is the boundary between the pipeline and the
//! persisted alert store shared with the summarization and notification
//! stages. The pipeline only ever calls [`find_by_key`](AlertStore::find_by_key)
//! and [`insert`](AlertStore::insert); [`pending`](AlertStore::pending) is the
//! hand-off read used by the downstream consumer.
//!
//! | Implementation | Use |
//! |----------------|-----|
//! | [`SqliteAlertStore`] | CLI and HTTP server |
//! | [`MemoryAlertStore`] | tests and embedding |
//!
//! Dedup is check-then-insert and not transactional. The SQLite schema
//! carries `UNIQUE(identity_key)`, and a violation on insert is reported as
//! [`InsertOutcome::AlreadyPresent`] rather than an error.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::models::{AlertRecord, NewAlert, RunSummary};
use crate::sources::IdentityKeyRule;

pub use memory::MemoryAlertStore;
pub use sqlite::SqliteAlertStore;

/// Result of an insert attempt.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(AlertRecord),
    /// Another record with the same identity key exists.
    AlreadyPresent,
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Look up a record by identity key.
    async fn find_by_key(&self, identity_key: &str) -> Result<Option<AlertRecord>>;

    /// Persist a new record in state `pending` with the placeholder summary.
    async fn insert(&self, alert: &NewAlert) -> Result<InsertOutcome>;

    /// Oldest `pending` records first, at most `limit`.
    async fn pending(&self, limit: i64) -> Result<Vec<AlertRecord>>;

    /// Append a finished run to the run history.
    async fn record_run(&self, summary: &RunSummary) -> Result<()>;
}

/// SHA-256 hex digest of the fields a source uses to identify a provision.
pub fn identity_key(rule: IdentityKeyRule, url: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    if rule == IdentityKeyRule::UrlAndTitle {
        hasher.update(b"\n");
        hasher.update(title.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
