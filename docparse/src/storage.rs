//! Transient storage for staged uploads and extracted text.
//!
//! Two directories are involved. The uploads directory holds one [`StoredFile`] per in-flight
//! request and is emptied as each request completes. The output directory accumulates
//! `<stem>-extracted.txt` artifacts which the service never deletes; a later upload with the same
//! base filename overwrites the earlier artifact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::{self, File, OpenOptions};
use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::errors::{Error, Result};

/// Suffix appended to the original file stem for extracted-text artifacts
pub const EXTRACTED_SUFFIX: &str = "-extracted.txt";

/// Upper bound on timestamp bumps when a staged name is already taken
const MAX_NAME_ATTEMPTS: i64 = 1000;

/// Resolved scratch directories, created once at startup.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    uploads_dir: PathBuf,
    output_dir: PathBuf,
}

impl StorageLayout {
    /// Create both directories if missing. Idempotent; failure should abort startup.
    pub async fn init(config: &StorageConfig) -> anyhow::Result<Self> {
        for dir in [&config.uploads_dir, &config.output_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create storage directory {}: {}", dir.display(), e))?;
        }

        debug!(
            uploads_dir = %config.uploads_dir.display(),
            output_dir = %config.output_dir.display(),
            "Storage directories ready"
        );

        Ok(Self {
            uploads_dir: config.uploads_dir.clone(),
            output_dir: config.output_dir.clone(),
        })
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Reserve a new staged upload named `<unix-millis>-<filename>` and open it for writing.
    ///
    /// The file is created with create-new semantics, so two requests can never share a staged
    /// file even when their original filenames match. On collision the timestamp is bumped.
    pub async fn create_upload(&self, filename: &str) -> Result<(StoredFile, File)> {
        let now = Utc::now().timestamp_millis();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.uploads_dir.join(format!("{}-{}", now + attempt, filename));

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((StoredFile::new(path), file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Error::io("store uploaded file", e)),
            }
        }

        Err(Error::io(
            "store uploaded file",
            std::io::Error::new(ErrorKind::AlreadyExists, "no free upload name available"),
        ))
    }

    /// Persist extracted text as `<output_dir>/<stem>-extracted.txt`, replacing any previous artifact.
    pub async fn write_extracted_text(&self, original_filename: &str, text: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(artifact_name(original_filename));

        fs::write(&path, text)
            .await
            .map_err(|e| Error::io("write extracted text", e))?;

        Ok(path)
    }
}

/// A staged upload owned by exactly one request.
///
/// Call [`StoredFile::release`] on the happy path; any other exit drops the guard, which removes
/// the file synchronously. Deletion failures are logged and never propagated.
#[derive(Debug)]
pub struct StoredFile {
    path: PathBuf,
    released: bool,
}

impl StoredFile {
    fn new(path: PathBuf) -> Self {
        Self { path, released: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn release(mut self) {
        self.released = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Removed staged upload"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove staged upload"),
        }
    }
}

impl Drop for StoredFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Synchronous unlink: Drop cannot await
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed staged upload after failed request"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove staged upload"),
        }
    }
}

/// Reduce a client-supplied filename to its final path component.
///
/// Browsers on Windows may send full paths with backslashes, so both separators are stripped.
/// Returns `None` when nothing usable is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// `report.pdf` -> `report-extracted.txt`
pub fn artifact_name(original_filename: &str) -> String {
    let stem = Path::new(original_filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| original_filename.to_string());
    format!("{}{}", stem, EXTRACTED_SUFFIX)
}

/// First `max_chars` characters of `text`, with `...` appended when anything was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
