//! In-memory [`AlertStore`] for tests and embedding.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`, indexed by identity
//! key. Check-and-insert happens under one write lock.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{AlertRecord, NewAlert, RunSummary, SummaryState, PENDING_SUMMARY};

use super::{AlertStore, InsertOutcome};

#[derive(Default)]
struct Inner {
    records: Vec<AlertRecord>,
    by_key: HashMap<String, usize>,
}

pub struct MemoryAlertStore {
    inner: RwLock<Inner>,
    runs: RwLock<Vec<RunSummary>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            runs: RwLock::new(Vec::new()),
        }
    }

    /// Every record, in insertion order.
    pub fn records(&self) -> Vec<AlertRecord> {
        self.inner
            .read()
            .map(|inner| inner.records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn runs(&self) -> Vec<RunSummary> {
        self.runs.read().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for MemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory alert store lock poisoned")
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn find_by_key(&self, identity_key: &str) -> Result<Option<AlertRecord>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .by_key
            .get(identity_key)
            .map(|&idx| inner.records[idx].clone()))
    }

    async fn insert(&self, alert: &NewAlert) -> Result<InsertOutcome> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if inner.by_key.contains_key(&alert.identity_key) {
            return Ok(InsertOutcome::AlreadyPresent);
        }

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

        let idx = inner.records.len();
        inner.records.push(record.clone());
        inner.by_key.insert(alert.identity_key.clone(), idx);
        Ok(InsertOutcome::Inserted(record))
    }

    async fn pending(&self, limit: i64) -> Result<Vec<AlertRecord>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.summary_state == SummaryState::Pending)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn record_run(&self, summary: &RunSummary) -> Result<()> {
        self.runs.write().map_err(poisoned)?.push(summary.clone());
        Ok(())
    }
}
