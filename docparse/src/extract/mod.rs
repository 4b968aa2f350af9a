//! Document text extraction.
//!
//! Each extractor turns the raw bytes of one format into a flat plain-text string. Structure
//! (tables, images, headers) is not interpreted. Extraction is CPU-bound and synchronous, so
//! [`extract_text`] runs it on the blocking thread pool.

mod doc;
mod docx;
mod pdf;

pub use doc::extract_doc;
pub use docx::extract_docx;
pub use pdf::extract_pdf;

use std::path::Path;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::errors::{Error, Result};
use crate::types::{DocumentFormat, extension_of};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("PDF extraction error: {0}")]
    Pdf(String),

    #[error("DOCX extraction error: {0}")]
    Docx(String),

    #[error("DOC extraction error: {0}")]
    Doc(String),

    /// The blocking task panicked or was cancelled
    #[error("Extraction worker failed: {0}")]
    Worker(String),
}

/// Read a staged upload and extract its text with the extractor for `format`.
#[instrument(skip_all, fields(format = %format, path = %path.display()))]
pub async fn extract_text(format: DocumentFormat, path: &Path) -> Result<String> {
    let extractor: fn(&[u8]) -> std::result::Result<String, ExtractError> = match format {
        DocumentFormat::Pdf => extract_pdf,
        DocumentFormat::WordModern => extract_docx,
        DocumentFormat::WordLegacy => extract_doc,
        DocumentFormat::Unsupported => {
            return Err(Error::UnsupportedFormat {
                extension: extension_of(&path.to_string_lossy()).unwrap_or_default(),
            });
        }
    };

    let bytes = tokio::fs::read(path).await.map_err(|e| Error::io("read uploaded file", e))?;
    let size = bytes.len();
    let started = Instant::now();

    let text = tokio::task::spawn_blocking(move || extractor(&bytes))
        .await
        .map_err(|e| ExtractError::Worker(e.to_string()))??;

    debug!(
        bytes = size,
        chars = text.chars().count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Extraction finished"
    );

    Ok(text)
}
