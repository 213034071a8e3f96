//! Attachment input: fetch the bytes and stage them on disk for OCR.
//!
//! ## Why stage to a file?
//!
//! Image decoders and most OCR engines want a path. Each image is written to
//! its own [`NamedTempFile`] inside the configured staging directory; the
//! random file name keeps concurrent invocations from colliding, and the file
//! is removed when the [`StagedImage`] is closed or dropped, on the error path
//! as much as on the success path.

use crate::error::RelayError;
use crate::event::{Attachment, AttachmentSource};
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// An attachment written to the staging directory.
///
/// The file exists exactly as long as this value.
#[derive(Debug)]
pub struct StagedImage {
    file: NamedTempFile,
}

impl StagedImage {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the staged file now, reporting any error.
    pub fn close(self) -> std::io::Result<()> {
        self.file.close()
    }
}

/// Create the staging directory if it does not exist yet.
///
/// # Errors
/// [`RelayError::StagingDir`] when the directory cannot be created, for
/// example because a regular file sits on the path.
pub fn prepare_staging_dir(staging_dir: &Path) -> Result<(), RelayError> {
    std::fs::create_dir_all(staging_dir).map_err(|source| RelayError::StagingDir {
        path: staging_dir.to_path_buf(),
        source,
    })
}

/// Write `bytes` to a fresh file in `staging_dir`.
///
/// The name is `trimg-<random>-<filename>`; the original filename is kept
/// (sanitised) so decoders that sniff the extension still work. File creation
/// runs on the blocking pool and the write goes through `tokio::fs`.
pub async fn stage(
    bytes: &[u8],
    filename: &str,
    staging_dir: &Path,
) -> std::io::Result<StagedImage> {
    tokio::fs::create_dir_all(staging_dir).await?;
    let suffix = format!("-{}", sanitize_filename(filename));
    let dir = staging_dir.to_path_buf();
    let file = tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix("trimg-")
            .suffix(&suffix)
            .tempfile_in(&dir)
    })
    .await
    .map_err(std::io::Error::other)??;
    tokio::fs::write(file.path(), bytes).await?;
    debug!("Staged {} bytes at {}", bytes.len(), file.path().display());
    Ok(StagedImage { file })
}

/// Keep only characters that are safe in a file name on every platform.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.chars().take(64).collect()
    }
}

/// Retrieve the bytes of an attachment.
///
/// Errors are returned as human-readable strings; the caller wraps them into
/// a per-image [`crate::error::ImageError`].
pub async fn fetch_attachment(
    attachment: &Attachment,
    timeout_secs: u64,
) -> Result<Vec<u8>, String> {
    match &attachment.source {
        AttachmentSource::Bytes(bytes) => Ok(bytes.clone()),
        AttachmentSource::File(path) => tokio::fs::read(path)
            .await
            .map_err(|e| format!("{}: {}", path.display(), e)),
        AttachmentSource::Url(url) => download_url(url, timeout_secs).await,
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, String> {
    debug!("Downloading attachment from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| e.to_string())?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            format!("download timed out after {timeout_secs}s")
        } else {
            e.to_string()
        }
    })?;

    if !response.status().is_success() {
        warn!("Attachment download {} answered HTTP {}", url, response.status());
        return Err(format!("HTTP {}", response.status()));
    }

    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
    Ok(bytes.to_vec())
}
