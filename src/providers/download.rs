use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::errors::ProviderError;
use crate::providers::{error_for_status, http_client, SubtitleFetcher};

/// Downloads subtitle files over HTTP and decodes them as UTF-8
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
        }
    }

    /// Decode a body as UTF-8, replacing invalid sequences
    pub fn decode_body(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher").finish()
    }
}

#[async_trait]
impl SubtitleFetcher for HttpFetcher {
    async fn download(&self, url: &str) -> Result<String, ProviderError> {
        debug!("Downloading subtitle: {}", url);

        let response = self.client.get(url).send().await?;
        let response = error_for_status("Subtitle download", response).await?;
        let bytes = response.bytes().await?;

        Ok(Self::decode_body(&bytes))
    }
}
