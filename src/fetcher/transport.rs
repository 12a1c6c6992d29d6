//! HTTP transport used by the fetcher.

use crate::config::FetchConfig;
use crate::error::{DownloadError, Result};
use async_trait::async_trait;

/// Capability to GET a URL and return its body
///
/// Implementations enforce their own request timeouts and report every failure
/// as a [`DownloadError`]; the fetcher never retries.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the full body of `url`
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, DownloadError>;
}

/// reqwest-backed transport with connect and request timeouts
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the HTTP client from fetch settings
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.max_concurrent_downloads)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, DownloadError> {
        let parsed = url::Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, &e))?;

        let status = response.status();
        tracing::debug!(url, status = status.as_u16(), "GET response");
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, &e))?;
        Ok(body.to_vec())
    }
}
