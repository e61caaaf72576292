//! Core data models used throughout the ingestion pipeline.
//!
//! [`RawDocument`], [`Transcript`] and [`Provision`] only live for the
//! duration of one run. [`AlertRecord`] is the persisted shape handed to the
//! downstream summarization and notification stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Placeholder written into `summary` when a record is first inserted.
pub const PENDING_SUMMARY: &str = "PENDING_SUMMARY";

/// Maximum length of a persisted title, in characters.
pub const MAX_TITLE_CHARS: usize = 140;

/// The fixed set of bulletin sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    /// Boletín Oficial del Estado (national).
    Boe,
    /// Boletín Oficial de la Junta de Andalucía.
    Boja,
    /// Boletín Oficial de Aragón.
    Boa,
    /// Boletín Oficial de Castilla y León.
    Bocyl,
    /// Diario Oficial de Castilla-La Mancha.
    Docm,
    /// Diario Oficial de Extremadura.
    Doe,
}

impl SourceTag {
    pub const ALL: [SourceTag; 6] = [
        SourceTag::Boe,
        SourceTag::Boja,
        SourceTag::Boa,
        SourceTag::Bocyl,
        SourceTag::Docm,
        SourceTag::Doe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Boe => "boe",
            SourceTag::Boja => "boja",
            SourceTag::Boa => "boa",
            SourceTag::Bocyl => "bocyl",
            SourceTag::Docm => "docm",
            SourceTag::Doe => "doe",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceTag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = SourceTag::ALL.iter().map(|t| t.as_str()).collect();
                format!("unknown source '{}'. Available: {}", s, known.join(", "))
            })
    }
}

/// What a source's listing points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Listing yields bulletin PDFs that must be fetched, extracted and segmented.
    Pdf,
    /// Listing items are provisions already (title + link), nothing to download.
    Structured,
}

/// One entry produced by a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub url: String,
    /// Item title, when the listing supplies one.
    pub title: Option<String>,
    /// Issuing department, when the listing groups items by department.
    pub department: Option<String>,
}

impl DocumentRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            department: None,
        }
    }
}

/// Downloaded bytes for one document.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source: SourceTag,
    pub url: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Full extracted text of one document.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub source: SourceTag,
    pub url: String,
    pub text: String,
}

/// A contiguous span of a transcript holding one provision.
///
/// `start..end` are byte offsets into the parent transcript; `text` is that
/// span with surrounding whitespace trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provision {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// A provision ready for filtering and dedup, with its inferred metadata.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: String,
    pub title: String,
    /// Issuing department from the listing, when it names one.
    pub department: Option<String>,
    pub content: String,
}

/// Terminal state of one candidate in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    Persisted,
    Duplicate,
    Rejected,
    /// The whole document was unusable (bad signature, no text).
    SkippedInvalid,
    Errored,
}

/// Lifecycle of a record's summary. Only `Pending` is written by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryState {
    Pending,
    Summarized,
    NotRelevant,
    Reviewed,
}

impl SummaryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryState::Pending => "pending",
            SummaryState::Summarized => "summarized",
            SummaryState::NotRelevant => "not_relevant",
            SummaryState::Reviewed => "reviewed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SummaryState::Pending),
            "summarized" => Some(SummaryState::Summarized),
            "not_relevant" => Some(SummaryState::NotRelevant),
            "reviewed" => Some(SummaryState::Reviewed),
            _ => None,
        }
    }

    /// `pending → {summarized | not_relevant} → reviewed`, never backwards.
    pub fn can_transition_to(&self, next: SummaryState) -> bool {
        matches!(
            (self, next),
            (SummaryState::Pending, SummaryState::Summarized)
                | (SummaryState::Pending, SummaryState::NotRelevant)
                | (SummaryState::Summarized, SummaryState::Reviewed)
                | (SummaryState::NotRelevant, SummaryState::Reviewed)
        )
    }
}

/// Insert payload for the alert store.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub identity_key: String,
    pub title: String,
    pub url: String,
    /// ISO `YYYY-MM-DD`.
    pub date: String,
    pub region: String,
    pub source: SourceTag,
    pub content: String,
}

/// A persisted alert.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub id: String,
    pub identity_key: String,
    pub title: String,
    pub summary: String,
    pub summary_state: SummaryState,
    pub url: String,
    pub date: String,
    pub region: String,
    pub source: String,
    pub content: String,
    pub created_at: i64,
}

/// Counters returned by one ingestion run.
///
/// Every candidate lands in exactly one of the five outcome counters, so
/// `total_candidates` always equals their sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub source: String,
    pub date: String,
    pub documents_found: u64,
    pub total_candidates: u64,
    pub inserted_new: u64,
    pub duplicates: u64,
    pub errors: u64,
    pub skipped_invalid_document: u64,
    pub skipped_by_filter: u64,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn new(source: SourceTag, date: &str) -> Self {
        Self {
            source: source.to_string(),
            date: date.to_string(),
            ..Default::default()
        }
    }

    /// Count one candidate under its terminal outcome.
    pub fn record(&mut self, outcome: CandidateOutcome) {
        self.total_candidates += 1;
        let counter = match outcome {
            CandidateOutcome::Persisted => &mut self.inserted_new,
            CandidateOutcome::Duplicate => &mut self.duplicates,
            CandidateOutcome::Rejected => &mut self.skipped_by_filter,
            CandidateOutcome::SkippedInvalid => &mut self.skipped_invalid_document,
            CandidateOutcome::Errored => &mut self.errors,
        };
        *counter += 1;
    }

    pub fn is_partitioned(&self) -> bool {
        self.total_candidates
            == self.inserted_new
                + self.duplicates
                + self.errors
                + self.skipped_invalid_document
                + self.skipped_by_filter
    }
}

/// Collapse whitespace runs and cap the result at [`MAX_TITLE_CHARS`].
pub fn clean_title(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(MAX_TITLE_CHARS) {
        Some((idx, _)) => collapsed[..idx].trim_end().to_string(),
        None => collapsed,
    }
}
