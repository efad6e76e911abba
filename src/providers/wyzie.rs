use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use url::Url;

use crate::app_config::ProvidersConfig;
use crate::errors::ProviderError;
use crate::providers::{error_for_status, http_client, SearchCriteria, SubtitleDescriptor, SubtitleProvider};

/// Wyzie subtitle search (primary source)
///
/// Accepts either an IMDb id or a TMDb id in the `id` parameter and is asked
/// for SRT results only.
pub struct Wyzie {
    endpoint: String,
    client: Client,
}

impl Wyzie {
    pub const NAME: &'static str = "wyzie";

    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: http_client(timeout_secs),
        }
    }

    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self::new(&config.wyzie_endpoint, config.timeout_secs)
    }

    pub fn search_url(&self, criteria: &SearchCriteria) -> Result<Url, ProviderError> {
        let mut params = vec![("id", criteria.id.clone())];
        if criteria.kind.is_series() {
            if let (Some(season), Some(episode)) = (criteria.season, criteria.episode) {
                params.push(("season", season.to_string()));
                params.push(("episode", episode.to_string()));
            }
        }
        params.push(("format", "srt".to_string()));

        Url::parse_with_params(&self.endpoint, &params)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid Wyzie endpoint: {}", e)))
    }
}

impl std::fmt::Debug for Wyzie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wyzie").field("endpoint", &self.endpoint).finish()
    }
}

#[async_trait]
impl SubtitleProvider for Wyzie {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn display_name(&self) -> &str {
        "Wyzie"
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<SubtitleDescriptor>, ProviderError> {
        let url = self.search_url(criteria)?;
        debug!("Searching Wyzie: {}", url);

        let response = self.client.get(url).send().await?;
        let response = error_for_status("Wyzie", response).await?;

        response
            .json::<Vec<SubtitleDescriptor>>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Wyzie response: {}", e)))
    }
}
