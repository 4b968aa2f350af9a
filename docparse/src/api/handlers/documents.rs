//! Document upload and text extraction.
//!
//! One request walks a fixed pipeline: receive and validate the upload while streaming it to a
//! staged file, extract its text, persist the text, then remove the staged file. The staged file
//! is a [`StoredFile`] guard, so it is removed on every exit path, including errors.

use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{info, instrument, warn};

use crate::AppState;
use crate::api::models::documents::ParseDocumentResponse;
use crate::errors::{Error, Result};
use crate::extract;
use crate::storage::{StoredFile, preview, sanitize_filename};
use crate::types::DocumentFormat;

/// Multipart field carrying the document
pub const DOCUMENT_FIELD: &str = "document";

/// An upload that passed validation and now lives in transient storage
#[derive(Debug)]
struct ReceivedDocument {
    original_filename: String,
    format: DocumentFormat,
    stored: StoredFile,
}

#[utoipa::path(
    post,
    path = "/parse-document",
    tag = "documents",
    summary = "Extract text from a document",
    description = "Upload a single PDF or Word document in the multipart field `document`. \
The extracted text is written to the output directory and a preview is returned.",
    request_body(
        content_type = "multipart/form-data",
        description = "Multipart form with one `document` file part (application/pdf, application/msword or \
application/vnd.openxmlformats-officedocument.wordprocessingml.document, at most 10 MiB by default)"
    ),
    responses(
        (status = 200, description = "Document parsed", body = ParseDocumentResponse),
        (status = 400, description = "Missing, empty, oversized or wrong-type file", body = crate::errors::ErrorResponse),
        (status = 500, description = "Extraction or storage failure", body = crate::errors::ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn parse_document(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ParseDocumentResponse>> {
    let mut multipart = multipart.map_err(|e| Error::BadRequest {
        message: format!("Expected a multipart/form-data upload: {}", e.body_text()),
    })?;

    let upload = receive_document(&state, &mut multipart).await?;

    let text = extract::extract_text(upload.format, upload.stored.path()).await?;

    let artifact = state
        .storage
        .write_extracted_text(&upload.original_filename, &text)
        .await?;

    info!(
        filename = %upload.original_filename,
        format = %upload.format,
        chars = text.chars().count(),
        artifact = %artifact.display(),
        "Document parsed"
    );

    upload.stored.release().await;

    Ok(Json(ParseDocumentResponse {
        success: true,
        message: "Document parsed successfully".to_string(),
        original_filename: upload.original_filename,
        extracted_text_path: artifact.display().to_string(),
        text_preview: preview(&text, state.config.preview_length),
    }))
}

/// Read the multipart body, validating and staging the single `document` field.
///
/// Media type and filename are checked before any bytes touch the disk. Size is enforced while
/// streaming; exceeding it drops the guard and with it the partial file.
async fn receive_document(state: &AppState, multipart: &mut Multipart) -> Result<ReceivedDocument> {
    let mut received: Option<ReceivedDocument> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(DOCUMENT_FIELD) {
            // Ignore unrelated fields
            continue;
        }

        if received.is_some() {
            return Err(Error::BadRequest {
                message: format!("Only one '{}' file may be uploaded per request", DOCUMENT_FIELD),
            });
        }

        let media_type = field.content_type().unwrap_or_default().to_string();
        if DocumentFormat::from_media_type(&media_type).is_none() {
            return Err(Error::BadRequest {
                message: "Invalid file type. Only PDF and Word documents are allowed.".to_string(),
            });
        }

        let original_filename = field
            .file_name()
            .and_then(sanitize_filename)
            .ok_or_else(|| Error::BadRequest {
                message: "Uploaded document must have a filename".to_string(),
            })?;
        let format = DocumentFormat::from_filename(&original_filename);

        let (stored, file) = state.storage.create_upload(&original_filename).await?;
        let size = stream_to_file(field, file, state.config.limits.max_file_size).await?;

        if size == 0 {
            return Err(Error::BadRequest {
                message: "Uploaded file is empty".to_string(),
            });
        }

        info!(
            filename = %original_filename,
            media_type = %media_type,
            format = %format,
            bytes = size,
            staged = %stored.path().display(),
            "Upload accepted"
        );

        received = Some(ReceivedDocument {
            original_filename,
            format,
            stored,
        });
    }

    received.ok_or_else(|| Error::BadRequest {
        message: "No file uploaded".to_string(),
    })
}

/// Copy a field into `file` chunk by chunk, failing fast once `max_file_size` is exceeded.
///
/// Takes the file handle by value so it is closed before the caller's guard can remove the path.
async fn stream_to_file(mut field: Field<'_>, mut file: File, max_file_size: u64) -> Result<u64> {
    let mut total_size = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        total_size += chunk.len() as u64;

        if total_size > max_file_size {
            warn!(total_size, max_file_size, "File size limit exceeded, aborting upload");
            return Err(too_large(max_file_size));
        }

        file.write_all(&chunk)
            .await
            .map_err(|e| Error::io("store uploaded file", e))?;
    }

    file.flush().await.map_err(|e| Error::io("store uploaded file", e))?;
    Ok(total_size)
}

fn too_large(max_file_size: u64) -> Error {
    Error::PayloadTooLarge {
        message: format!(
            "File too large. Maximum allowed size is {} bytes ({} MB)",
            max_file_size,
            max_file_size / (1024 * 1024)
        ),
    }
}

/// Body-limit failures surface here as 413s from axum; report them as a size violation.
fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge {
            message: format!("File too large: {}", e.body_text()),
        }
    } else {
        Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e.body_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::models::documents::ParseDocumentResponse;
    use crate::test_utils::{create_test_app, create_test_config, dir_entries, minimal_doc, minimal_docx, minimal_pdf};
    use crate::types::{MIME_DOC, MIME_DOCX, MIME_PDF};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::Value;
    use std::future::IntoFuture;

    fn document(bytes: Vec<u8>, filename: &str, mime: &str) -> MultipartForm {
        MultipartForm::new().add_part("document", Part::bytes(bytes).file_name(filename).mime_type(mime))
    }

    #[test_log::test(tokio::test)]
    async fn test_parse_pdf() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        let response = server
            .post("/parse-document")
            .multipart(document(minimal_pdf("Hello World"), "hello.pdf", MIME_PDF))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ParseDocumentResponse = response.json();
        assert!(body.success);
        assert_eq!(body.message, "Document parsed successfully");
        assert_eq!(body.original_filename, "hello.pdf");
        assert!(body.text_preview.contains("Hello World"));

        let artifact = config.storage.output_dir.join("hello-extracted.txt");
        assert_eq!(body.extracted_text_path, artifact.display().to_string());
        assert!(std::fs::read_to_string(&artifact).unwrap().contains("Hello World"));

        assert!(dir_entries(&config.storage.uploads_dir).is_empty());
    }

    #[tokio::test]
    async fn test_parse_word_documents() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        let response = server
            .post("/parse-document")
            .multipart(document(minimal_docx(&["Quarterly report", "All good"]), "Report.DOCX", MIME_DOCX))
            .await;
        response.assert_status(StatusCode::OK);
        let body: ParseDocumentResponse = response.json();
        assert_eq!(body.text_preview, "Quarterly report\n\nAll good");

        let response = server
            .post("/parse-document")
            .multipart(document(minimal_doc("Legacy memo\r"), "memo.doc", MIME_DOC))
            .await;
        response.assert_status(StatusCode::OK);
        let body: ParseDocumentResponse = response.json();
        assert_eq!(body.text_preview, "Legacy memo");

        assert_eq!(
            dir_entries(&config.storage.output_dir),
            vec!["Report-extracted.txt".to_string(), "memo-extracted.txt".to_string()]
        );
        assert!(dir_entries(&config.storage.uploads_dir).is_empty());
    }

    #[tokio::test]
    async fn test_preview_is_truncated() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        let long = "word ".repeat(100);
        let response = server
            .post("/parse-document")
            .multipart(document(minimal_docx(&[long.trim()]), "long.docx", MIME_DOCX))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ParseDocumentResponse = response.json();
        assert_eq!(body.text_preview.chars().count(), 203);
        assert!(body.text_preview.ends_with("..."));

        // The artifact holds the full text
        let full = std::fs::read_to_string(config.storage.output_dir.join("long-extracted.txt")).unwrap();
        assert_eq!(full, long.trim());
    }

    #[tokio::test]
    async fn test_rejects_wrong_media_type() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        for (name, mime) in [("notes.txt", "text/plain"), ("photo.png", "image/png")] {
            let response = server
                .post("/parse-document")
                .multipart(document(b"some bytes".to_vec(), name, mime))
                .await;

            response.assert_status(StatusCode::BAD_REQUEST);
            let json: Value = response.json();
            assert_eq!(json["error"], "Invalid file type. Only PDF and Word documents are allowed.");
        }

        assert!(dir_entries(&config.storage.uploads_dir).is_empty());
        assert!(dir_entries(&config.storage.output_dir).is_empty());
    }

    #[tokio::test]
    async fn test_rejects_missing_document_field() {
        let root = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(root.path())).await;

        let response = server
            .post("/parse-document")
            .multipart(
                MultipartForm::new()
                    .add_text("comment", "forgot the file")
                    .add_part("file", Part::bytes(minimal_pdf("x")).file_name("x.pdf").mime_type(MIME_PDF)),
            )
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json: Value = response.json();
        assert_eq!(json["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_rejects_non_multipart_body() {
        let root = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(root.path())).await;

        let response = server.post("/parse-document").text("just text").await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json: Value = response.json();
        assert!(json["error"].as_str().unwrap().starts_with("Expected a multipart/form-data upload"));
    }

    #[tokio::test]
    async fn test_rejects_second_document() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        let form = MultipartForm::new()
            .add_part("document", Part::bytes(minimal_pdf("one")).file_name("one.pdf").mime_type(MIME_PDF))
            .add_part("document", Part::bytes(minimal_pdf("two")).file_name("two.pdf").mime_type(MIME_PDF));
        let response = server.post("/parse-document").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(dir_entries(&config.storage.uploads_dir).is_empty());
        assert!(dir_entries(&config.storage.output_dir).is_empty());
    }

    #[tokio::test]
    async fn test_rejects_empty_file() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        let response = server
            .post("/parse-document")
            .multipart(document(Vec::new(), "empty.pdf", MIME_PDF))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(dir_entries(&config.storage.uploads_dir).is_empty());
    }

    #[tokio::test]
    async fn test_rejects_oversized_file() {
        let root = tempfile::tempdir().unwrap();
        let mut config = create_test_config(root.path());
        config.limits.max_file_size = 1024;
        let server = create_test_app(config.clone()).await;

        let response = server
            .post("/parse-document")
            .multipart(document(vec![b'a'; 4096], "big.pdf", MIME_PDF))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json: Value = response.json();
        assert!(json["error"].as_str().unwrap().starts_with("File too large"));

        assert!(dir_entries(&config.storage.uploads_dir).is_empty());
        assert!(dir_entries(&config.storage.output_dir).is_empty());
    }

    #[tokio::test]
    async fn test_rejects_file_over_default_limit() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        let response = server
            .post("/parse-document")
            .multipart(document(vec![0u8; 10 * 1024 * 1024 + 1], "huge.pdf", MIME_PDF))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(dir_entries(&config.storage.uploads_dir).is_empty());
        assert!(dir_entries(&config.storage.output_dir).is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        let response = server
            .post("/parse-document")
            .multipart(document(b"%PDF-1.4 but nothing else".to_vec(), "broken.pdf", MIME_PDF))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = response.json();
        assert!(json["error"].as_str().unwrap().contains("extraction"), "got {json}");

        assert!(dir_entries(&config.storage.uploads_dir).is_empty());
        assert!(dir_entries(&config.storage.output_dir).is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_processing_failure() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        let response = server
            .post("/parse-document")
            .multipart(document(minimal_pdf("Hello"), "hello.txt", MIME_PDF))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = response.json();
        assert_eq!(json["error"], "Unsupported file format: txt");
        assert!(dir_entries(&config.storage.uploads_dir).is_empty());
    }

    #[tokio::test]
    async fn test_artifact_write_failure_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        // A directory squatting on the artifact name makes the write fail
        std::fs::create_dir(config.storage.output_dir.join("blocked-extracted.txt")).unwrap();

        let response = server
            .post("/parse-document")
            .multipart(document(minimal_docx(&["text"]), "blocked.docx", MIME_DOCX))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = response.json();
        assert!(json["error"].as_str().unwrap().starts_with("Failed to write extracted text"));
        assert!(dir_entries(&config.storage.uploads_dir).is_empty());
    }

    #[tokio::test]
    async fn test_client_path_is_stripped_from_filename() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        let response = server
            .post("/parse-document")
            .multipart(document(minimal_docx(&["safe"]), "../../escape.docx", MIME_DOCX))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ParseDocumentResponse = response.json();
        assert_eq!(body.original_filename, "escape.docx");
        assert!(config.storage.output_dir.join("escape-extracted.txt").exists());
        assert!(!root.path().join("escape-extracted.txt").exists());
    }

    #[tokio::test]
    async fn test_concurrent_uploads_with_same_name_share_one_artifact() {
        let root = tempfile::tempdir().unwrap();
        let config = create_test_config(root.path());
        let server = create_test_app(config.clone()).await;

        let first = server
            .post("/parse-document")
            .multipart(document(minimal_docx(&["from first"]), "same.docx", MIME_DOCX))
            .into_future();
        let second = server
            .post("/parse-document")
            .multipart(document(minimal_docx(&["from second"]), "same.docx", MIME_DOCX))
            .into_future();
        let (first, second) = tokio::join!(first, second);

        first.assert_status(StatusCode::OK);
        second.assert_status(StatusCode::OK);

        assert_eq!(dir_entries(&config.storage.output_dir), vec!["same-extracted.txt".to_string()]);
        let survivor = std::fs::read_to_string(config.storage.output_dir.join("same-extracted.txt")).unwrap();
        assert!(survivor.starts_with("from "));
        assert!(dir_entries(&config.storage.uploads_dir).is_empty());
    }
}
