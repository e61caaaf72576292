//! Ingestion pipeline orchestration.
//!
//! One [`Pipeline`] per source, parameterized by its [`SourceProfile`].
//! A run locates the day's documents and drives each one, strictly in
//! sequence, through
//!
//! ```text
//! Located → Fetched → Validated → Extracted → Segmented
//!   → per candidate: Filtered → {Persisted | Duplicate | Rejected}
//! ```
//!
//! Structured sources skip straight from `Located` to `Segmented`: each
//! listing item already is a candidate. A document that fails before
//! segmentation counts as one candidate (`Errored` for fetch failures,
//! `SkippedInvalid` for bad signatures and failed extraction). Every
//! candidate ends in exactly one outcome, so the counters of the returned
//! [`RunSummary`] always partition `total_candidates`.
//!
//! Only setup problems abort a run; they surface as
//! [`IngestError::Configuration`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::db;
use crate::error::IngestError;
use crate::extract::extract_transcript_blocking;
use crate::fetch::{check_pdf_signature, DocumentFetcher, HttpFetcher, Validation};
use crate::locator::{FeedLocator, Locator};
use crate::migrate;
use crate::models::{
    clean_title, Candidate, CandidateOutcome, DocumentKind, DocumentRef, NewAlert, RawDocument,
    RunSummary, SourceTag, Transcript,
};
use crate::relevance::{Classifier, Verdict};
use crate::segment::Segmenter;
use crate::sources::{SourceProfile, TitleRule};
use crate::store::{identity_key, AlertStore, InsertOutcome, SqliteAlertStore};

/// Where one located document stands.
enum Stage {
    Located(DocumentRef),
    Fetched(DocumentRef, RawDocument),
    Validated(DocumentRef, RawDocument),
    Extracted(DocumentRef, Transcript),
    Segmented(Vec<Candidate>),
    /// Terminal for the whole document; counts as one candidate.
    Failed(CandidateOutcome),
}

pub struct Pipeline {
    profile: SourceProfile,
    locator: Arc<dyn Locator>,
    fetcher: Arc<dyn DocumentFetcher>,
    store: Arc<dyn AlertStore>,
    segmenter: Segmenter,
    classifier: Classifier,
}

impl Pipeline {
    pub fn new(
        profile: SourceProfile,
        locator: Arc<dyn Locator>,
        fetcher: Arc<dyn DocumentFetcher>,
        store: Arc<dyn AlertStore>,
    ) -> Result<Self, IngestError> {
        let segmenter = Segmenter::new(&profile.heading_patterns).map_err(|e| {
            IngestError::configuration(format!(
                "invalid heading pattern for source '{}': {}",
                profile.tag, e
            ))
        })?;
        let classifier = Classifier::from_rule(&profile.relevance)?;

        Ok(Self {
            profile,
            locator,
            fetcher,
            store,
            segmenter,
            classifier,
        })
    }

    /// Pipeline with the HTTP locator for `tag`. Fails when the source has
    /// no listing endpoint.
    pub fn from_config(
        config: &Config,
        tag: SourceTag,
        fetcher: Arc<HttpFetcher>,
        store: Arc<dyn AlertStore>,
    ) -> Result<Self, IngestError> {
        let profile = SourceProfile::from_config(config, tag);
        let locator = FeedLocator::new(fetcher.client().clone(), &profile)?;
        Self::new(profile, Arc::new(locator), fetcher, store)
    }

    pub fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    #[instrument(skip(self), fields(source = %self.profile.tag))]
    pub async fn run(&self, date: NaiveDate) -> Result<RunSummary, IngestError> {
        let started = Instant::now();
        let date_iso = date.format("%Y-%m-%d").to_string();
        let mut summary = RunSummary::new(self.profile.tag, &date_iso);

        let refs = self.locator.locate(date).await?;
        summary.documents_found = refs.len() as u64;
        info!(documents = refs.len(), "located documents");

        for doc in refs {
            let url = doc.url.clone();
            match self.process_document(doc).await {
                Ok(candidates) => {
                    debug!(%url, candidates = candidates.len(), "segmented document");
                    for candidate in &candidates {
                        let outcome = self.settle(candidate, &date_iso).await;
                        summary.record(outcome);
                    }
                }
                Err(outcome) => summary.record(outcome),
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;

        if let Err(e) = self.store.record_run(&summary).await {
            warn!(error = %e, "failed to record run history");
        }

        info!(
            found = summary.documents_found,
            candidates = summary.total_candidates,
            inserted = summary.inserted_new,
            duplicates = summary.duplicates,
            filtered = summary.skipped_by_filter,
            invalid = summary.skipped_invalid_document,
            errors = summary.errors,
            "ingest run finished"
        );
        Ok(summary)
    }

    /// Drive one document until it is segmented (its candidates) or has
    /// failed (the single outcome it counts as).
    async fn process_document(&self, doc: DocumentRef) -> Result<Vec<Candidate>, CandidateOutcome> {
        let mut stage = Stage::Located(doc);
        loop {
            stage = match stage {
                Stage::Located(doc) => self.fetch(doc).await,
                Stage::Fetched(doc, raw) => match check_pdf_signature(&raw) {
                    Validation::Valid => Stage::Validated(doc, raw),
                    Validation::NotValid { reason } => {
                        let err = IngestError::InvalidDocument { url: doc.url, reason };
                        warn!(error = %err, "skipping document");
                        Stage::Failed(CandidateOutcome::SkippedInvalid)
                    }
                },
                Stage::Validated(doc, raw) => {
                    let RawDocument {
                        source, url, bytes, ..
                    } = raw;
                    match extract_transcript_blocking(bytes).await {
                        Ok(text) => Stage::Extracted(doc, Transcript { source, url, text }),
                        Err(e) => {
                            let err = IngestError::Extraction { url, source: e };
                            warn!(error = %err, "skipping document");
                            Stage::Failed(CandidateOutcome::SkippedInvalid)
                        }
                    }
                }
                Stage::Extracted(doc, transcript) => Stage::Segmented(self.candidates(&doc, &transcript)),
                Stage::Segmented(candidates) => return Ok(candidates),
                Stage::Failed(outcome) => return Err(outcome),
            };
        }
    }

    async fn fetch(&self, doc: DocumentRef) -> Stage {
        if self.profile.document_kind == DocumentKind::Structured {
            return Stage::Segmented(vec![structured_candidate(&doc)]);
        }
        match self.fetcher.fetch(self.profile.tag, &doc.url).await {
            Ok(raw) => Stage::Fetched(doc, raw),
            Err(e) => {
                warn!(error = %e, "fetch failed");
                Stage::Failed(CandidateOutcome::Errored)
            }
        }
    }

    fn candidates(&self, doc: &DocumentRef, transcript: &Transcript) -> Vec<Candidate> {
        self.segmenter
            .segment(&transcript.text)
            .into_iter()
            .map(|provision| {
                let title = match (self.profile.title_rule, doc.title.as_deref()) {
                    (TitleRule::ItemTitle, Some(item_title)) => clean_title(item_title),
                    _ => clean_title(&provision.text),
                };
                Candidate {
                    url: transcript.url.clone(),
                    title,
                    department: doc.department.clone(),
                    content: provision.text,
                }
            })
            .collect()
    }

    /// Filter, dedup and persist one candidate.
    async fn settle(&self, candidate: &Candidate, date_iso: &str) -> CandidateOutcome {
        let verdict = self.classifier.classify(
            &candidate.title,
            candidate.department.as_deref(),
            &candidate.content,
        );
        match verdict {
            Verdict::Accepted { matched } => {
                debug!(title = %candidate.title, %matched, "accepted");
            }
            Verdict::Excluded { matched } => {
                debug!(title = %candidate.title, %matched, "excluded");
                return CandidateOutcome::Rejected;
            }
            Verdict::NoMatch => return CandidateOutcome::Rejected,
        }

        let key = identity_key(self.profile.identity_key, &candidate.url, &candidate.title);

        match self.store.find_by_key(&key).await {
            Ok(Some(_)) => return CandidateOutcome::Duplicate,
            Ok(None) => {}
            Err(e) => {
                warn!(error = %IngestError::persistence(e), "dedup lookup failed");
                return CandidateOutcome::Errored;
            }
        }

        let alert = NewAlert {
            identity_key: key,
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            date: date_iso.to_string(),
            region: self.profile.region.to_string(),
            source: self.profile.tag,
            content: candidate.content.clone(),
        };

        match self.store.insert(&alert).await {
            Ok(InsertOutcome::Inserted(record)) => {
                info!(id = %record.id, title = %record.title, "new alert");
                CandidateOutcome::Persisted
            }
            Ok(InsertOutcome::AlreadyPresent) => CandidateOutcome::Duplicate,
            Err(e) => {
                warn!(error = %IngestError::persistence(e), "insert failed");
                CandidateOutcome::Errored
            }
        }
    }
}

/// A structured listing item is its own candidate: title from the listing,
/// content is the department line plus the title.
fn structured_candidate(doc: &DocumentRef) -> Candidate {
    let title = doc.title.as_deref().unwrap_or_default();
    let content = match &doc.department {
        Some(department) => format!("{}\n{}", department.trim(), title.trim()),
        None => title.trim().to_string(),
    };
    Candidate {
        url: doc.url.clone(),
        title: clean_title(title),
        department: doc.department.clone(),
        content,
    }
}

/// Parse `YYYYMMDD` or `YYYY-MM-DD`; `None` means today (local time).
pub fn parse_target_date(raw: Option<&str>) -> Result<NaiveDate, IngestError> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(chrono::Local::now().date_naive());
    };
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| {
            IngestError::configuration(format!(
                "invalid date '{}': expected YYYYMMDD or YYYY-MM-DD",
                raw
            ))
        })
}

/// Run every enabled source concurrently. Each source stays sequential.
pub async fn run_all(
    config: &Config,
    date: NaiveDate,
    fetcher: Arc<HttpFetcher>,
    store: Arc<dyn AlertStore>,
) -> Vec<(SourceTag, Result<RunSummary, IngestError>)> {
    let mut results = Vec::new();
    let mut pipelines = Vec::new();

    for tag in config.enabled_sources() {
        match Pipeline::from_config(config, tag, fetcher.clone(), store.clone()) {
            Ok(pipeline) => pipelines.push(pipeline),
            Err(e) => results.push((tag, Err(e))),
        }
    }

    results.extend(run_pipelines(pipelines, date).await);
    results.sort_by_key(|(tag, _)| SourceTag::ALL.iter().position(|t| t == tag));
    results
}

/// Run pipelines concurrently, one task each. A task that panics or is
/// cancelled still yields a result for its source.
pub async fn run_pipelines(
    pipelines: Vec<Pipeline>,
    date: NaiveDate,
) -> Vec<(SourceTag, Result<RunSummary, IngestError>)> {
    let mut results = Vec::new();
    let mut set = JoinSet::new();
    let mut tasks = HashMap::new();

    for pipeline in pipelines {
        let tag = pipeline.profile().tag;
        let handle = set.spawn(async move { (tag, pipeline.run(date).await) });
        tasks.insert(handle.id(), tag);
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((tag, result)) => results.push((tag, result)),
            Err(e) => {
                warn!(error = %e, "ingest task failed");
                if let Some(tag) = tasks.get(&e.id()) {
                    results.push((*tag, Err(IngestError::Task(e.to_string()))));
                }
            }
        }
    }

    results
}

/// `gazette ingest <source|all>`.
pub async fn run_ingest(config: &Config, source: &str, date: Option<&str>, json: bool) -> Result<()> {
    let date = parse_target_date(date)?;

    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let store: Arc<dyn AlertStore> = Arc::new(SqliteAlertStore::new(pool.clone()));
    let fetcher = Arc::new(HttpFetcher::from_config(&config.fetch)?);

    let results = if source.eq_ignore_ascii_case("all") {
        if config.enabled_sources().is_empty() {
            bail!("No sources configured. Set sources.<tag>.listing_url in the config file.");
        }
        run_all(config, date, fetcher, store).await
    } else {
        let tag: SourceTag = source.parse().map_err(anyhow::Error::msg)?;
        if config.source(tag).is_some_and(|s| !s.enabled) {
            bail!("Source '{}' is disabled in the config file", tag);
        }
        let result = match Pipeline::from_config(config, tag, fetcher, store) {
            Ok(pipeline) => pipeline.run(date).await,
            Err(e) => Err(e),
        };
        vec![(tag, result)]
    };

    pool.close().await;

    let mut summaries = Vec::new();
    let mut failures = Vec::new();
    for (tag, result) in results {
        match result {
            Ok(summary) => summaries.push(summary),
            Err(e) => failures.push(format!("{}: {}", tag, e)),
        }
    }

    if json && !summaries.is_empty() {
        if summaries.len() == 1 && failures.is_empty() {
            println!("{}", serde_json::to_string_pretty(&summaries[0])?);
        } else {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
    } else if !json {
        for summary in &summaries {
            print_summary(summary);
        }
    }

    match failures.len() {
        0 => Ok(()),
        1 if summaries.is_empty() => bail!("{}", failures[0]),
        _ => bail!("{} source(s) failed:\n  {}", failures.len(), failures.join("\n  ")),
    }
}

pub fn print_summary(summary: &RunSummary) {
    println!("ingest {} {}", summary.source, summary.date);
    println!("  documents found: {}", summary.documents_found);
    println!("  candidates: {}", summary.total_candidates);
    println!("  inserted new: {}", summary.inserted_new);
    println!("  duplicates: {}", summary.duplicates);
    println!("  skipped by filter: {}", summary.skipped_by_filter);
    println!("  skipped invalid document: {}", summary.skipped_invalid_document);
    println!("  errors: {}", summary.errors);
    println!("  duration: {} ms", summary.duration_ms);
    println!("ok");
}
