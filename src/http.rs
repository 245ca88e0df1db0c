use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::cbz::ImageFetcher;
use crate::config::ClientConfig;

/// HTTP client shared by scraping and image downloads
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
    transferred_bytes: AtomicU64,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            config,
            transferred_bytes: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying reqwest client, for requests that need no retry
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get total bytes received from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// GET `url` and return the body as text
    pub async fn get_text(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<String> {
        let text = self.get(url, headers).await?.text().await?;
        self.transferred_bytes
            .fetch_add(text.len() as u64, Ordering::Relaxed);
        Ok(text)
    }

    /// GET `url` and return the raw body
    pub async fn get_bytes(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>> {
        let bytes = self.get(url, headers).await?.bytes().await?;
        self.transferred_bytes
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        Ok(bytes.to_vec())
    }

    async fn get(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<Response> {
        let mut retry_count = 0;

        loop {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let failure = match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(url, status = %resp.status(), "fetched");
                    return Ok(resp);
                }
                Ok(resp) if is_retryable_status(resp.status()) => {
                    format!("status {}", resp.status())
                }
                Ok(resp) => bail!("HTTP request to {} failed with status: {}", url, resp.status()),
                Err(e) if e.is_timeout() || e.is_connect() => e.to_string(),
                Err(e) => return Err(e.into()),
            };

            retry_count += 1;
            if retry_count >= self.config.max_retry {
                bail!("Max retries exceeded for {}: {}", url, failure);
            }
            warn!(
                url,
                "request failed, retry {}/{}: {}", retry_count, self.config.max_retry, failure
            );
            tokio::time::sleep(self.config.retry_delay * retry_count).await;
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpClient {
    async fn fetch_image(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<Vec<u8>> {
        self.get_bytes(url, headers).await
    }
}

/// Rate limiting and transient server errors, including Cloudflare's 52x range
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
