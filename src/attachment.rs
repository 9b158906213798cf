//! Staged file attachments.
//!
//! An [`Attachment`] owns its staged file. Consuming it reads, encodes and
//! deletes the file; dropping it unconsumed deletes the file too. Either way
//! the bytes never outlive the request that carried them.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

use crate::error::{ForgeError, Result};
use crate::request::Blob;
use crate::{log_debug, log_warn};

/// A caller-supplied file staged on disk for exactly one request
#[derive(Debug)]
pub struct Attachment {
    path: PathBuf,
    media_type: String,
    original_name: String,
    /// Cleared once the staged file has been handled
    armed: bool,
}

/// Encoded attachment ready to embed in a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAttachment {
    pub blob: Blob,
    pub original_name: String,
    pub size: usize,
}

impl EncodedAttachment {
    /// Text stand-in for the file in stored transcripts
    pub fn transcript_note(&self) -> String {
        format!(
            "[attached file: {} ({}, {} bytes)]",
            self.original_name, self.blob.mime_type, self.size
        )
    }
}

impl Attachment {
    /// Take ownership of a file the transport layer already staged.
    pub fn new(
        path: impl Into<PathBuf>,
        media_type: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            media_type: media_type.into(),
            original_name: original_name.into(),
            armed: true,
        }
    }

    /// Write `bytes` to a fresh, unpredictable file name under `dir`.
    pub async fn stage(
        dir: &Path,
        bytes: &[u8],
        media_type: impl Into<String>,
        original_name: impl Into<String>,
    ) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("upload-{}", Uuid::new_v4().simple()));
        discard_on_error(&path, tokio::fs::write(&path, bytes).await).await?;
        log_debug!("Staged {} bytes at {}", bytes.len(), path.display());
        Ok(Self::new(path, media_type, original_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Read, base64-encode and delete the staged file.
    ///
    /// The file is removed whether or not the read succeeded.
    pub async fn consume(mut self) -> Result<EncodedAttachment> {
        let read = tokio::fs::read(&self.path).await;
        self.remove_staged().await;

        let bytes = match read {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ForgeError::AttachmentMissing(self.path.clone()));
            }
            Err(source) => {
                return Err(ForgeError::AttachmentIo {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        Ok(EncodedAttachment {
            blob: Blob {
                mime_type: self.media_type.clone(),
                data: STANDARD.encode(&bytes),
            },
            original_name: self.original_name.clone(),
            size: bytes.len(),
        })
    }

    async fn remove_staged(&mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => log_debug!("Removed staged attachment {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log_warn!(
                "Failed to remove staged attachment {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => log_debug!(
                "Discarded unconsumed attachment {}",
                self.path.display()
            ),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log_warn!(
                "Failed to discard attachment {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Remove a partly written staged file when its write failed.
async fn discard_on_error<T>(path: &Path, outcome: std::io::Result<T>) -> std::io::Result<T> {
    if outcome.is_err() {
        match tokio::fs::remove_file(path).await {
            Ok(()) => log_debug!("Removed partial upload {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log_warn!("Failed to remove partial upload {}: {}", path.display(), e),
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_consume_encodes_and_deletes() {
        let dir = TempDir::new().expect("temp dir");
        let attachment = Attachment::stage(dir.path(), b"hello", "text/plain", "notes.txt")
            .await
            .expect("stage");
        let path = attachment.path().to_path_buf();
        assert!(path.exists());

        let encoded = attachment.consume().await.expect("consume");
        assert_eq!(encoded.blob.mime_type, "text/plain");
        assert_eq!(encoded.blob.data, "aGVsbG8=");
        assert_eq!(encoded.size, 5);
        assert!(encoded.transcript_note().contains("notes.txt"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_partial_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("upload-partial");
        tokio::fs::write(&path, b"half of the").await.expect("partial write");

        let outcome: std::io::Result<()> =
            discard_on_error(&path, Err(std::io::Error::other("disk full"))).await;
        assert!(outcome.is_err());
        assert!(!path.exists());

        let kept = dir.path().join("upload-complete");
        tokio::fs::write(&kept, b"whole").await.expect("write");
        discard_on_error(&kept, Ok(())).await.expect("success passes through");
        assert!(kept.exists());
    }

    #[tokio::test]
    async fn test_missing_staged_file_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("gone.pdf");
        let attachment = Attachment::new(&path, "application/pdf", "gone.pdf");

        match attachment.consume().await {
            Err(ForgeError::AttachmentMissing(missing)) => assert_eq!(missing, path),
            other => panic!("expected AttachmentMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dropping_unconsumed_attachment_removes_file() {
        let dir = TempDir::new().expect("temp dir");
        let attachment = Attachment::stage(dir.path(), b"x", "image/png", "x.png")
            .await
            .expect("stage");
        let path = attachment.path().to_path_buf();

        drop(attachment);
        assert!(!path.exists());
    }
}
