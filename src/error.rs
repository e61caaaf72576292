//! Error taxonomy for an ingestion run.
//!
//! Only [`IngestError::Configuration`] is fatal to a run. [`IngestError::Task`]
//! replaces the result of a whole source run that never finished. Every
//! other variant is scoped to one document or one candidate: the
//! orchestrator records it in the run summary and moves on to the next item.

use thiserror::Error;

/// Failure while turning PDF bytes into a transcript.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("document has no extractable text")]
    NoText,
    #[error("PDF extraction panicked")]
    Panicked,
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// Run setup failed (no listing endpoint, bad pattern, bad date).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network failure or a status outside 2xx/3xx.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The payload does not look like the document kind the source publishes.
    #[error("not a valid document at {url}: {reason}")]
    InvalidDocument { url: String, reason: String },

    #[error("extraction failed for {url}: {source}")]
    Extraction {
        url: String,
        #[source]
        source: ExtractError,
    },

    /// Store lookup or insert failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A concurrently running source task panicked or was cancelled.
    #[error("ingest task failed: {0}")]
    Task(String),
}

impl IngestError {
    pub fn configuration(message: impl Into<String>) -> Self {
        IngestError::Configuration(message.into())
    }

    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        IngestError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(err: anyhow::Error) -> Self {
        IngestError::Persistence(format!("{:#}", err))
    }

    /// True for the one variant that aborts a whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::Configuration(_))
    }
}
