use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.mangahere.cc";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Settings for outbound HTTP: scraping requests and image downloads
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Site root that relative links resolve against
    pub base_url: String,
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Attempts per request before giving up on timeouts, connection
    /// errors, 429 and 5xx responses
    pub max_retry: u32,
    /// Back-off unit; attempt `n` waits `n * retry_delay`
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_retry: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}
