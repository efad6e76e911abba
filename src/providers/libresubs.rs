use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use url::Url;

use crate::app_config::ProvidersConfig;
use crate::errors::ProviderError;
use crate::providers::{error_for_status, http_client, SearchCriteria, SubtitleDescriptor, SubtitleProvider};

/// LibreSubs subtitle search (fallback source, catalog ids only)
pub struct LibreSubs {
    endpoint: String,
    client: Client,
}

impl LibreSubs {
    pub const NAME: &'static str = "libresubs";

    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: http_client(timeout_secs),
        }
    }

    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self::new(&config.libresubs_endpoint, config.timeout_secs)
    }

    pub fn search_url(&self, criteria: &SearchCriteria) -> Result<Url, ProviderError> {
        let mut params = vec![("id", criteria.id.clone())];
        if criteria.kind.is_series() {
            params.push(("season", criteria.season.unwrap_or(0).to_string()));
            params.push(("episode", criteria.episode.unwrap_or(0).to_string()));
        }

        Url::parse_with_params(&self.endpoint, &params)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid LibreSubs endpoint: {}", e)))
    }
}

impl std::fmt::Debug for LibreSubs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibreSubs").field("endpoint", &self.endpoint).finish()
    }
}

#[async_trait]
impl SubtitleProvider for LibreSubs {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn display_name(&self) -> &str {
        "LibreSubs"
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<SubtitleDescriptor>, ProviderError> {
        let url = self.search_url(criteria)?;
        debug!("Trying LibreSubs: {}", url);

        let response = self.client.get(url).send().await?;
        let response = error_for_status("LibreSubs", response).await?;

        // The service answers `null` when it has nothing
        let results = response
            .json::<Option<Vec<SubtitleDescriptor>>>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse LibreSubs response: {}", e)))?;

        Ok(results.unwrap_or_default())
    }
}
