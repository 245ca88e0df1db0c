use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use super::{ArchiveStore, StoreError, StoredArchive, validate_file_name};

/// How long a stored archive stays downloadable.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(48 * 60 * 60);

/// Outcome of reading an archive back out of a [`LocalStore`]
#[derive(Debug)]
pub enum Retrieved {
    Found(Vec<u8>),
    Missing,
    /// The archive outlived its retention and has been removed
    Expired,
}

/// Keeps archives in a directory on disk and forgets them after a while
pub struct LocalStore {
    dir: PathBuf,
    retention: Duration,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, file_name: &str) -> Result<PathBuf, StoreError> {
        validate_file_name(file_name)?;
        Ok(self.dir.join(file_name))
    }

    fn is_expired(&self, modified: SystemTime) -> bool {
        // A modification time in the future counts as brand new.
        let age = modified.elapsed().unwrap_or_default();
        age >= self.retention
    }

    fn expiry(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let retention = chrono::Duration::from_std(self.retention).ok()?;
        created_at.checked_add_signed(retention)
    }

    /// Write `archive` to disk, going through a temporary file so a
    /// half-written archive is never served. Every write gets its own
    /// temporary file, which is removed again if the write fails.
    pub async fn write(
        &self,
        file_name: &str,
        archive: impl Into<Vec<u8>>,
    ) -> Result<StoredArchive, StoreError> {
        let path = self.path_for(file_name)?;
        let archive = archive.into();
        let size = archive.len() as u64;
        tokio::fs::create_dir_all(&self.dir).await?;

        let dir = self.dir.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut partial = tempfile::Builder::new()
                .prefix(".")
                .suffix(".part")
                .tempfile_in(&dir)?;
            partial.write_all(&archive)?;
            partial.as_file().sync_all()?;
            partial.persist(&target)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!("Stored {} ({} bytes)", path.display(), size);
        let created_at = Utc::now();
        Ok(StoredArchive {
            file_name: file_name.to_string(),
            location: path.display().to_string(),
            size,
            created_at,
            expires_at: self.expiry(created_at),
        })
    }

    /// Metadata for a stored archive that has not expired yet
    pub async fn stat(&self, file_name: &str) -> Result<Option<StoredArchive>, StoreError> {
        let path = self.path_for(file_name)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let modified = metadata.modified()?;
        if self.is_expired(modified) {
            return Ok(None);
        }

        let created_at = DateTime::<Utc>::from(modified);
        Ok(Some(StoredArchive {
            file_name: file_name.to_string(),
            location: path.display().to_string(),
            size: metadata.len(),
            created_at,
            expires_at: self.expiry(created_at),
        }))
    }

    /// Read an archive back, deleting it instead if it has expired
    pub async fn read(&self, file_name: &str) -> Result<Retrieved, StoreError> {
        let path = self.path_for(file_name)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Retrieved::Missing),
            Err(e) => return Err(e.into()),
        };

        if self.is_expired(metadata.modified()?) {
            info!(file_name, "removing expired archive");
            tokio::fs::remove_file(&path).await?;
            return Ok(Retrieved::Expired);
        }

        Ok(Retrieved::Found(tokio::fs::read(&path).await?))
    }

    /// Delete every expired archive, returning how many were removed
    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if is_partial_write(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || !self.is_expired(metadata.modified()?) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
            }
        }

        if removed > 0 {
            info!(removed, dir = %self.dir.display(), "purged expired archives");
        }
        Ok(removed)
    }
}

/// Temporary files of writes still in flight
fn is_partial_write(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".part")
}

#[async_trait]
impl ArchiveStore for LocalStore {
    async fn put(&self, file_name: &str, archive: Vec<u8>) -> Result<StoredArchive> {
        Ok(self.write(file_name, archive).await?)
    }

    async fn lookup(&self, file_name: &str) -> Result<Option<StoredArchive>> {
        Ok(self.stat(file_name).await?)
    }

    fn download_link(&self, stored: &StoredArchive, base_url: &str) -> Result<String> {
        Ok(format!(
            "{}/download/{}",
            base_url.trim_end_matches('/'),
            stored.file_name
        ))
    }
}
