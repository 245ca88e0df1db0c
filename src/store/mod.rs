//! Where finished archives go once they are built.

mod catbox;
mod local;

pub use catbox::{CATBOX_API_URL, CatboxStore, is_catbox_file_url};
pub use local::{DEFAULT_RETENTION, LocalStore, Retrieved};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid archive file name {0:?}")]
    InvalidFileName(String),
    #[error("upload rejected: {0}")]
    UploadRejected(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An archive that has been handed to a store
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArchive {
    pub file_name: String,
    /// Remote URL or local path
    pub location: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    /// When the store will forget the archive, if it ever does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Destination for built archives
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Store `archive` under `file_name`
    async fn put(&self, file_name: &str, archive: Vec<u8>) -> Result<StoredArchive>;

    /// A previously stored archive that can still be served, if the store
    /// keeps track of them
    async fn lookup(&self, _file_name: &str) -> Result<Option<StoredArchive>> {
        Ok(None)
    }

    /// Link clients should use to download `stored`, relative to the
    /// server's own `base_url`
    fn download_link(&self, stored: &StoredArchive, base_url: &str) -> Result<String>;
}

/// Reject names that could escape the store's namespace
fn validate_file_name(file_name: &str) -> Result<(), StoreError> {
    if file_name.is_empty()
        || file_name.contains("..")
        || file_name.contains('/')
        || file_name.contains('\\')
    {
        return Err(StoreError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}
