use reqwest::Client;
use std::path::Path;
use tokio::fs as async_fs;
use tracing::debug;
use url::Url;

use crate::error::{Result, RigError};

/// Fetches probe thumbnails over HTTP.
#[derive(Clone)]
pub struct ThumbnailFetcher {
    client: Client,
}

impl ThumbnailFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("mediarig/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Download `url` to `dest`, returning the number of bytes written.
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let url = Url::parse(url)
            .map_err(|e| RigError::InvalidRequest(format!("Invalid thumbnail URL '{}': {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RigError::InvalidRequest(format!(
                "Unsupported thumbnail URL scheme: {}",
                url.scheme()
            )));
        }

        debug!("Fetching thumbnail {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        async_fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_http_urls() {
        let fetcher = ThumbnailFetcher::new().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = fetcher
            .fetch("file:///etc/passwd", &dir.path().join("t.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, RigError::InvalidRequest(_)));

        let err = fetcher.fetch("NA", &dir.path().join("t.jpg")).await.unwrap_err();
        assert!(matches!(err, RigError::InvalidRequest(_)));
        assert!(!dir.path().join("t.jpg").exists());
    }
}
