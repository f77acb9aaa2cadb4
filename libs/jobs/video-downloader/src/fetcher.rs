//! Fetching video bytes from the public endpoint.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("video request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("empty video body from '{0}'")]
    EmptyBody(String),
}

/// Seam between the job and the network: tests stub it, production uses
/// [`HttpVideoFetcher`].
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Plain HTTP GET of the video bytes.
#[derive(Default)]
pub struct HttpVideoFetcher {
    client: reqwest::Client,
}

impl HttpVideoFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoFetcher for HttpVideoFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        info!(endpoint = %url, "Downloading video");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyBody(url.to_string()));
        }
        info!(size = bytes.len(), "Video downloaded successfully");
        Ok(bytes.to_vec())
    }
}
