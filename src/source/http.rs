//! HTTP client shared by all vendor adapters

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::source::error::FetchError;

const USER_AGENT: &str = concat!("release-watch/", env!("CARGO_PKG_VERSION"));

/// Fetches vendor pages with a per-request timeout
#[derive(Clone)]
pub struct PageClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl PageClient {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_millis(config.timeout.max(0) as u64);
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self { client, timeout })
    }

    /// GET `url` and return the body text of a successful response
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned status {}", url, status);
            return Err(FetchError::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(error)
        }
    }
}
