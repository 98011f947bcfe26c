//! Scanned ballot image archival.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no image archive directory configured")]
    NotConfigured,
    #[error("archive i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ImageArchiver: Send + Sync {
    /// Stores one uploaded scan of `election_id` and returns where it went.
    async fn archive(
        &self,
        election_id: i64,
        content_type: Option<&str>,
        image: Bytes,
    ) -> Result<PathBuf, ArchiveError>;
}

/// Writes `<root>/<election>/<unix-millis>-<n>.<ext>`.
pub struct FileImageArchiver {
    root: PathBuf,
    sequence: AtomicU64,
}

impl FileImageArchiver {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn extension_for(content_type: Option<&str>) -> &'static str {
    let essence = content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase());
    match essence.as_deref() {
        Some("image/jpeg") | Some("image/jpg") => "jpg",
        Some("image/png") => "png",
        _ => "bin",
    }
}

#[async_trait]
impl ImageArchiver for FileImageArchiver {
    async fn archive(
        &self,
        election_id: i64,
        content_type: Option<&str>,
        image: Bytes,
    ) -> Result<PathBuf, ArchiveError> {
        let dir = self.root.join(election_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}-{n}.{}",
            Utc::now().timestamp_millis(),
            extension_for(content_type)
        );
        let path = dir.join(name);
        tokio::fs::write(&path, &image).await?;

        info!(election_id, path = %path.display(), size_bytes = image.len(), "archived scan");
        Ok(path)
    }
}
