use std::panic::{AssertUnwindSafe, catch_unwind};

use super::ExtractError;

/// Extract the text layer of a PDF.
///
/// Only "digital-native" PDFs carry a text layer; scanned pages yield little or no text and no
/// OCR is attempted. The parser panics on some malformed input, so panics are caught and
/// reported as extraction errors.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let text = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|_| ExtractError::Pdf("parser aborted on malformed document".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(text.trim().to_string())
}
