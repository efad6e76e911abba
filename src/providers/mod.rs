/*!
 * Clients for the external services the pipeline depends on.
 *
 * Each collaborator sits behind an async trait so the pipeline can be driven
 * with real HTTP clients or with the mocks in `mock`:
 * - `tmdb`: external id lookup (TMDb)
 * - `wyzie`: primary subtitle search
 * - `libresubs`: fallback subtitle search
 * - `download`: plain HTTP subtitle download
 * - `google`: translation backend
 */

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::request::MediaKind;

/// Query sent to a subtitle search service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Identifier understood by the service (catalog id or external id)
    pub id: String,
    pub kind: MediaKind,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// One search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleDescriptor {
    /// Language tag reported by the service (e.g. "en")
    #[serde(default)]
    pub language: Option<String>,

    /// Where the subtitle text can be downloaded
    pub url: String,

    #[serde(default, alias = "fileName", alias = "display")]
    pub filename: Option<String>,
}

impl SubtitleDescriptor {
    /// Human readable label for logs
    pub fn label(&self) -> &str {
        self.filename.as_deref().unwrap_or(&self.url)
    }
}

/// Subtitle search service
#[async_trait]
pub trait SubtitleProvider: Send + Sync + Debug {
    /// Stable provider name ("wyzie", "libresubs")
    fn name(&self) -> &str;

    /// Name shown in progress messages
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Search for subtitles; an empty list means nothing was found
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<SubtitleDescriptor>, ProviderError>;
}

/// Downloads raw subtitle text
#[async_trait]
pub trait SubtitleFetcher: Send + Sync + Debug {
    async fn download(&self, url: &str) -> Result<String, ProviderError>;
}

/// Single-text translation backend
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Translate one piece of text from `source_language` to `target_language`
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError>;
}

/// Maps a catalog id to the external (IMDb) id
#[async_trait]
pub trait ExternalIdService: Send + Sync + Debug {
    /// `Ok(None)` when the catalog has no external id for the item
    async fn lookup(&self, catalog_id: &str, kind: MediaKind) -> Result<Option<String>, ProviderError>;
}

/// Build an HTTP client with the given request timeout
pub(crate) fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("subrelay/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Turn a non-success response into a `ProviderError`
pub(crate) async fn error_for_status(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    log::error!("{} API error ({}): {}", service, status, body);

    Err(ProviderError::from_status(status.as_u16(), format!("{} API error: {}", service, body)))
}

pub mod download;
pub mod google;
pub mod libresubs;
pub mod mock;
pub mod tmdb;
pub mod wyzie;
