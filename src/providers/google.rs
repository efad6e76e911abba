use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::app_config::TranslationConfig;
use crate::errors::ProviderError;
use crate::providers::{error_for_status, http_client, TranslationBackend};

/// Client for the Google translate-pa endpoint
pub struct GoogleTranslate {
    /// Endpoint URL
    endpoint: String,
    /// API key sent as the `key` query parameter
    api_key: String,
    /// HTTP client for making requests
    client: Client,
}

/// Response body; only the translated text is used
#[derive(Debug, Deserialize)]
pub struct TranslateResponse {
    #[serde(default)]
    pub translation: Option<String>,
}

impl GoogleTranslate {
    /// Create a new translate client
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client: http_client(timeout_secs),
        }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(&config.endpoint, &config.api_key, config.timeout_secs)
    }

    /// Build the request URL for one text
    pub fn request_url(&self, text: &str, source_language: &str, target_language: &str) -> Result<Url, ProviderError> {
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("params.client", "gtx"),
                ("query.source_language", source_language),
                ("query.target_language", target_language),
                ("query.display_language", "en-US"),
                ("query.text", text),
                ("key", self.api_key.as_str()),
                ("data_types", "TRANSLATION"),
                ("data_types", "SENTENCE_SPLITS"),
                ("data_types", "BILINGUAL_DICTIONARY_FULL"),
            ],
        )
        .map_err(|e| ProviderError::RequestFailed(format!("Invalid translate endpoint: {}", e)))
    }

    /// Extract the translation, falling back to the input when the service
    /// returns none
    pub fn extract_translation(response: TranslateResponse, original: &str) -> String {
        response
            .translation
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| original.to_string())
    }
}

impl std::fmt::Debug for GoogleTranslate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslate")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait]
impl TranslationBackend for GoogleTranslate {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        let url = self.request_url(text, source_language, target_language)?;
        debug!("Translating {} chars ({} -> {})", text.len(), source_language, target_language);

        let response = self.client.get(url).send().await?;
        let response = error_for_status("Translation", response).await?;

        let body = response
            .json::<TranslateResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse translation response: {}", e)))?;

        Ok(Self::extract_translation(body, text))
    }
}
