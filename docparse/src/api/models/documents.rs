use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of a successful `POST /parse-document`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParseDocumentResponse {
    pub success: bool,
    #[schema(example = "Document parsed successfully")]
    pub message: String,
    /// Filename as sent by the client (final path component only)
    #[schema(example = "report.pdf")]
    pub original_filename: String,
    /// Where the full extracted text was written
    #[schema(example = "temp/report-extracted.txt")]
    pub extracted_text_path: String,
    /// Leading characters of the extracted text, suffixed with `...` when truncated
    pub text_preview: String,
}
