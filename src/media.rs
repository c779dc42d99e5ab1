//! Media sources for a series
//!
//! A series posts every media file of a folder. [`MediaStore`] abstracts where
//! that folder lives; [`LocalMediaStore`] reads one from disk.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::error::{BulkpostError, Result};

/// One media file of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Opaque id, stable while the file is unchanged. Used as cache key.
    pub id: String,
    /// File name shown in progress and sent with the upload.
    pub name: String,
    pub mime_type: String,
    pub path: PathBuf,
}

/// Where the media of a series comes from.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// List the media files, in posting order.
    async fn list(&self) -> Result<Vec<MediaFile>>;

    /// Read a file's payload.
    async fn fetch(&self, file: &MediaFile) -> Result<Bytes>;
}

/// MIME type for a supported media extension.
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

/// Media files in a local directory (not recursive).
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hex SHA-256 of path, size and modification time.
    fn file_id(path: &Path, metadata: &std::fs::Metadata) -> String {
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(metadata.len().to_le_bytes());
        hasher.update(modified.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn list(&self) -> Result<Vec<MediaFile>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| BulkpostError::Media(format!("cannot read {}: {}", self.root.display(), e)))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            // Follows symlinks; a dangling link is skipped like any non-file
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let Some(mime_type) = mime_type_for(&path) else {
                tracing::debug!(path = %path.display(), "Skipping non-media file");
                continue;
            };

            files.push(MediaFile {
                id: Self::file_id(&path, &metadata),
                name: entry.file_name().to_string_lossy().into_owned(),
                mime_type: mime_type.to_string(),
                path,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn fetch(&self, file: &MediaFile) -> Result<Bytes> {
        let data = tokio::fs::read(&file.path)
            .await
            .map_err(|e| BulkpostError::Media(format!("cannot read {}: {}", file.path.display(), e)))?;
        Ok(Bytes::from(data))
    }
}
