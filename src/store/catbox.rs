use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use tracing::info;

use super::{ArchiveStore, StoreError, StoredArchive, validate_file_name};

pub const CATBOX_API_URL: &str = "https://catbox.moe/user/api.php";

/// Successful uploads answer with a plain-text URL under this prefix.
const CATBOX_FILES_PREFIX: &str = "https://files.catbox.moe/";

/// Uploads archives to catbox.moe under a user hash
pub struct CatboxStore {
    client: Client,
    user_hash: String,
    upload_url: String,
}

impl CatboxStore {
    pub fn new(client: Client, user_hash: impl Into<String>) -> Self {
        Self {
            client,
            user_hash: user_hash.into(),
            upload_url: CATBOX_API_URL.to_string(),
        }
    }
}

#[async_trait]
impl ArchiveStore for CatboxStore {
    async fn put(&self, file_name: &str, archive: Vec<u8>) -> Result<StoredArchive> {
        validate_file_name(file_name)?;
        let size = archive.len() as u64;

        let part = Part::bytes(archive)
            .file_name(file_name.to_string())
            .mime_str("application/zip")?;
        let form = Form::new()
            .text("reqtype", "fileupload")
            .text("userhash", self.user_hash.clone())
            .part("fileToUpload", part);

        let body = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .context("Catbox upload failed")?
            .text()
            .await
            .context("Catbox upload failed")?;

        let location = check_upload_response(&body)?;
        info!(file_name, %location, size, "uploaded archive to catbox");

        Ok(StoredArchive {
            file_name: file_name.to_string(),
            location,
            size,
            created_at: Utc::now(),
            expires_at: None,
        })
    }

    fn download_link(&self, stored: &StoredArchive, base_url: &str) -> Result<String> {
        rename_link(base_url, &stored.location, &stored.file_name)
    }
}

/// Whether `url` points at a file hosted on catbox.moe
pub fn is_catbox_file_url(url: &str) -> bool {
    url.starts_with(CATBOX_FILES_PREFIX)
}

fn check_upload_response(body: &str) -> Result<String, StoreError> {
    let body = body.trim();
    if is_catbox_file_url(body) {
        Ok(body.to_string())
    } else {
        Err(StoreError::UploadRejected(body.to_string()))
    }
}

/// Catbox names files randomly, so downloads go through the server's
/// `/rename` route to get the chapter's file name back.
fn rename_link(base_url: &str, location: &str, file_name: &str) -> Result<String> {
    let url = Url::parse_with_params(
        &format!("{}/rename", base_url.trim_end_matches('/')),
        &[("url", location), ("filename", file_name)],
    )?;
    Ok(url.into())
}
