//! HTTP document fetcher.
//!
//! One `reqwest::Client` per process, configured from `[fetch]`: request
//! timeout, bounded redirects, a descriptive user agent and a payload cap.
//! The same client serves listing requests (see [`crate::locator`]).
//!
//! No retries. A failed fetch is reported to the orchestrator, which counts
//! it and moves on.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::IngestError;
use crate::models::{RawDocument, SourceTag};

/// Leading bytes of every PDF file.
pub const PDF_SIGNATURE: &[u8] = b"%PDF";

/// Downloads raw document bytes.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, source: SourceTag, url: &str) -> Result<RawDocument, IngestError>;
}

/// Result of checking a payload against the expected document kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    NotValid { reason: String },
}

/// Servers sometimes answer a missing bulletin with a 200 HTML page; that
/// payload is "not valid", not an error.
pub fn check_pdf_signature(doc: &RawDocument) -> Validation {
    if doc.bytes.starts_with(PDF_SIGNATURE) {
        return Validation::Valid;
    }
    let head: String = doc
        .bytes
        .iter()
        .take(16)
        .map(|b| if b.is_ascii_graphic() { *b as char } else { '.' })
        .collect();
    let reason = match doc.content_type.as_deref() {
        Some(content_type) => format!(
            "missing %PDF signature (served as {}, starts with '{}')",
            content_type, head
        ),
        None => format!("missing %PDF signature (starts with '{}')", head),
    };
    Validation::NotValid { reason }
}

/// Build the shared HTTP client from `[fetch]` settings.
pub fn build_client(config: &FetchConfig) -> Result<reqwest::Client, IngestError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| IngestError::configuration(format!("failed to build HTTP client: {}", e)))
}

/// `true` for the 2xx and 3xx ranges.
pub fn is_accepted_status(status: reqwest::StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self, IngestError> {
        Ok(Self::new(build_client(config)?, config.max_bytes))
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, source: SourceTag, url: &str) -> Result<RawDocument, IngestError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::fetch(url, e))?;

        let status = response.status();
        if !is_accepted_status(status) {
            return Err(IngestError::fetch(url, format!("HTTP {}", status)));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(IngestError::fetch(
                    url,
                    format!("payload of {} bytes exceeds limit of {}", len, self.max_bytes),
                ));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| IngestError::fetch(url, e))? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(IngestError::fetch(
                    url,
                    format!("payload exceeds limit of {} bytes", self.max_bytes),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!(%url, bytes = bytes.len(), "fetched document");

        Ok(RawDocument {
            source,
            url: url.to_string(),
            bytes,
            content_type,
        })
    }
}
