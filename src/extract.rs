//! PDF text extraction.
//!
//! Turns uploaded PDF bytes into an ordered list of [`Page`]s. Parsing is
//! delegated to `pdf-extract`; this module only shapes its output.

use tracing::{info, warn};

use crate::error::ChatError;
use crate::models::Page;

/// MIME type accepted by the upload surfaces.
pub const MIME_PDF: &str = "application/pdf";

/// Extract page-level text from PDF bytes.
///
/// Pages keep their 0-based position in the document even when some of them
/// carry no text, so chunk provenance points at the real page.
pub fn load_pdf(bytes: &[u8]) -> Result<Vec<Page>, ChatError> {
    let texts = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ChatError::Pdf(e.to_string()))?;

    let pages: Vec<Page> = texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Page { index, text })
        .collect();

    let blank = pages.iter().filter(|p| p.text.trim().is_empty()).count();
    if blank > 0 {
        warn!("{} of {} pages have no extractable text", blank, pages.len());
    }
    info!("Extracted {} pages", pages.len());

    Ok(pages)
}

/// [`load_pdf`] on the blocking thread pool, for callers on an async runtime.
pub async fn load_pdf_blocking(bytes: Vec<u8>) -> anyhow::Result<Vec<Page>> {
    let pages = tokio::task::spawn_blocking(move || load_pdf(&bytes))
        .await
        .map_err(|e| anyhow::anyhow!("PDF extraction task failed: {}", e))??;
    Ok(pages)
}

/// Whether an upload looks like a PDF, by content type or file extension.
pub fn is_pdf_upload(file_name: &str, content_type: Option<&str>) -> bool {
    if content_type == Some(MIME_PDF) {
        return true;
    }
    file_name.to_ascii_lowercase().ends_with(".pdf")
}
