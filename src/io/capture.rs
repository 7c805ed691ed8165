//! Capture provider contract
//!
//! The camera/gallery surface lives outside this crate; it only has to
//! deliver image bytes and a content type. A file-backed provider is
//! supplied for the CLI and for tests.

use crate::domain::types::{CaptureError, CapturedPhoto};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::debug;

/// External collaborator that produces a photo on request (camera shot,
/// gallery pick). Permission flow is the collaborator's concern; here it
/// surfaces only as `CaptureError::Unavailable`.
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    async fn acquire(&self) -> Result<CapturedPhoto, CaptureError>;
}

/// Reads the photo from a file on disk. The CLI's stand-in for a camera.
pub struct FileCaptureProvider {
    path: PathBuf,
    mime: String,
}

impl FileCaptureProvider {
    pub fn new(path: impl AsRef<Path>, mime: impl Into<String>) -> Self {
        Self { path: path.as_ref().to_path_buf(), mime: mime.into() }
    }
}

#[async_trait]
impl CaptureProvider for FileCaptureProvider {
    async fn acquire(&self) -> Result<CapturedPhoto, CaptureError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            CaptureError::Unavailable(format!("{}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "photo_read_from_file");
        Ok(CapturedPhoto::new(Bytes::from(bytes), self.mime.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_file_capture_reads_bytes_and_mime() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"\xff\xd8\xffjpeg-ish").unwrap();
        file.flush().unwrap();

        let provider = FileCaptureProvider::new(file.path(), "image/jpeg");
        let photo = provider.acquire().await.unwrap();

        assert_eq!(photo.bytes.as_ref(), b"\xff\xd8\xffjpeg-ish");
        assert_eq!(photo.mime, "image/jpeg");
    }

    #[tokio::test]
    async fn test_file_capture_missing_file_is_unavailable() {
        let provider = FileCaptureProvider::new("/nonexistent/photo.jpg", "image/jpeg");
        let err = provider.acquire().await.unwrap_err();
        assert!(matches!(err, CaptureError::Unavailable(_)));
    }
}
