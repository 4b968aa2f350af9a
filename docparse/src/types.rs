//! Document formats accepted by the upload endpoint.

use std::fmt;
use std::path::Path;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_DOC: &str = "application/msword";

/// Closed set of formats the pipeline knows about.
///
/// Chosen once when the upload is received and carried through to extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    /// Office Open XML (.docx)
    WordModern,
    /// Word 97-2003 binary (.doc)
    WordLegacy,
    Unsupported,
}

impl DocumentFormat {
    /// Map a declared media type onto a format. Returns `None` for types the upload filter rejects.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            MIME_PDF => Some(DocumentFormat::Pdf),
            MIME_DOCX => Some(DocumentFormat::WordModern),
            MIME_DOC => Some(DocumentFormat::WordLegacy),
            _ => None,
        }
    }

    /// Select the extractor from the filename extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Self {
        match extension_of(filename).as_deref() {
            Some("pdf") => DocumentFormat::Pdf,
            Some("docx") => DocumentFormat::WordModern,
            Some("doc") => DocumentFormat::WordLegacy,
            _ => DocumentFormat::Unsupported,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::WordModern => "docx",
            DocumentFormat::WordLegacy => "doc",
            DocumentFormat::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Lowercased extension of `filename`, without the dot
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
