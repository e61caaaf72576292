//! PDF text extraction.
//!
//! Turns fetched PDF bytes into one transcript string. Whitespace runs inside
//! a page collapse to a single space and pages are joined with `\n`, so the
//! heading patterns of the segmenter see one flat line per page.
//!
//! Parsing is CPU-bound and the PDF parser may panic on malformed input, so
//! the pipeline calls [`extract_transcript_blocking`], which runs on tokio's
//! blocking pool and maps a panic to [`ExtractError::Panicked`].

use crate::error::ExtractError;

/// Extract the text of every page, in page order.
pub fn extract_transcript(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let text = pages
        .iter()
        .map(|page| collapse_whitespace(page))
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        return Err(ExtractError::NoText);
    }
    Ok(text)
}

/// [`extract_transcript`] on the blocking pool.
pub async fn extract_transcript_blocking(bytes: Vec<u8>) -> Result<String, ExtractError> {
    match tokio::task::spawn_blocking(move || extract_transcript(&bytes)).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(ExtractError::Panicked),
        Err(e) => Err(ExtractError::Pdf(e.to_string())),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_transcript(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_) | ExtractError::Panicked));
    }

    #[test]
    fn collapse_whitespace_flattens_layout() {
        assert_eq!(
            collapse_whitespace("  ORDEN   de\n\n1 de\tenero \r\n"),
            "ORDEN de 1 de enero"
        );
    }

    #[tokio::test]
    async fn blocking_wrapper_reports_garbage_as_error() {
        let result = extract_transcript_blocking(b"%PDF-1.4 truncated".to_vec()).await;
        assert!(result.is_err());
    }
}
