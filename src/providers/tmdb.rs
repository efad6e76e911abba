use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::app_config::ProvidersConfig;
use crate::errors::ProviderError;
use crate::providers::{error_for_status, http_client, ExternalIdService};
use crate::request::MediaKind;

/// TMDb client resolving catalog ids to IMDb ids
pub struct Tmdb {
    /// API base URL
    endpoint: String,
    /// API key
    api_key: String,
    /// HTTP client for making requests
    client: Client,
}

/// `/external_ids` response; unrelated ids are ignored
#[derive(Debug, Deserialize)]
pub struct ExternalIds {
    #[serde(default)]
    pub imdb_id: Option<String>,
}

impl Tmdb {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client: http_client(timeout_secs),
        }
    }

    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self::new(&config.tmdb_endpoint, &config.tmdb_api_key, config.timeout_secs)
    }

    /// `<endpoint>/<movie|tv>/<id>/external_ids?api_key=...`
    pub fn external_ids_url(&self, catalog_id: &str, kind: MediaKind) -> Result<Url, ProviderError> {
        let base = format!(
            "{}/{}/{}/external_ids",
            self.endpoint.trim_end_matches('/'),
            kind.as_str(),
            catalog_id
        );

        Url::parse_with_params(&base, &[("api_key", self.api_key.as_str())])
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid TMDb endpoint: {}", e)))
    }
}

impl std::fmt::Debug for Tmdb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tmdb").field("endpoint", &self.endpoint).finish()
    }
}

#[async_trait]
impl ExternalIdService for Tmdb {
    async fn lookup(&self, catalog_id: &str, kind: MediaKind) -> Result<Option<String>, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::AuthenticationError("TMDb API key is not configured".to_string()));
        }

        let url = self.external_ids_url(catalog_id, kind)?;
        let response = self.client.get(url).send().await?;
        let response = error_for_status("TMDb", response).await?;

        let ids = response
            .json::<ExternalIds>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse TMDb response: {}", e)))?;

        let imdb_id = ids.imdb_id.filter(|id| !id.is_empty());
        debug!("TMDb {} {} -> {:?}", kind, catalog_id, imdb_id);
        Ok(imdb_id)
    }
}
