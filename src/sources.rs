/*!
 * Source subtitle resolution with provider fallback.
 *
 * The primary provider is asked first, using the external id when one is
 * known. The fallback provider is asked only when the primary errors or finds
 * nothing, and always with the catalog id. Provider errors never escape: they
 * become an `Unresolved` outcome naming every provider consulted.
 */

use log::{info, warn};
use std::sync::Arc;

use crate::providers::{SearchCriteria, SubtitleDescriptor, SubtitleProvider};
use crate::request::CacheKey;

/// Language tag preferred within a result set
pub const PREFERRED_SOURCE_LANGUAGE: &str = "en";

/// Where to look for a source subtitle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    pub key: CacheKey,
    /// External (IMDb) id, when the lookup found one
    pub external_id: Option<String>,
}

/// A provider about to be consulted
#[derive(Debug, Clone, Copy)]
pub struct ProviderAttempt<'a> {
    pub provider: &'a str,
    pub display_name: &'a str,
    /// Previous provider's display name when this is a fallback attempt
    pub after_failure_of: Option<&'a str>,
}

/// Chosen source subtitle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub subtitle: SubtitleDescriptor,
    /// Name of the provider that supplied it
    pub source: String,
}

/// Outcome of a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedSource),
    Unresolved {
        /// Description of the last failure
        error: String,
        sources_tried: Vec<String>,
    },
}

/// Ordered primary/fallback subtitle search
#[derive(Debug, Clone)]
pub struct SourceResolver {
    primary: Arc<dyn SubtitleProvider>,
    fallback: Arc<dyn SubtitleProvider>,
    preferred_language: String,
}

impl SourceResolver {
    pub fn new(primary: Arc<dyn SubtitleProvider>, fallback: Arc<dyn SubtitleProvider>) -> Self {
        Self {
            primary,
            fallback,
            preferred_language: PREFERRED_SOURCE_LANGUAGE.to_string(),
        }
    }

    /// Prefer a different language tag within result sets
    pub fn with_preferred_language(mut self, language: impl Into<String>) -> Self {
        self.preferred_language = language.into();
        self
    }

    /// Names of the providers in the order they are consulted
    pub fn provider_names(&self) -> Vec<String> {
        vec![self.primary.name().to_string(), self.fallback.name().to_string()]
    }

    /// Find a source subtitle, reporting each provider before it is consulted
    pub async fn resolve<F>(&self, query: &SourceQuery, on_attempt: F) -> Resolution
    where
        F: Fn(ProviderAttempt<'_>),
    {
        let key = &query.key;
        let primary_criteria = SearchCriteria {
            id: query.external_id.clone().unwrap_or_else(|| key.catalog_id.clone()),
            kind: key.kind,
            season: key.season,
            episode: key.episode,
        };
        let fallback_criteria = SearchCriteria {
            id: key.catalog_id.clone(),
            ..primary_criteria.clone()
        };

        on_attempt(ProviderAttempt {
            provider: self.primary.name(),
            display_name: self.primary.display_name(),
            after_failure_of: None,
        });
        let primary_error = match self.search(self.primary.as_ref(), &primary_criteria).await {
            Ok(resolved) => return Resolution::Resolved(resolved),
            Err(error) => error,
        };
        warn!("{} failed: {}", self.primary.display_name(), primary_error);

        on_attempt(ProviderAttempt {
            provider: self.fallback.name(),
            display_name: self.fallback.display_name(),
            after_failure_of: Some(self.primary.display_name()),
        });
        match self.search(self.fallback.as_ref(), &fallback_criteria).await {
            Ok(resolved) => Resolution::Resolved(resolved),
            Err(error) => {
                warn!("{} failed: {}", self.fallback.display_name(), error);
                Resolution::Unresolved {
                    error,
                    sources_tried: self.provider_names(),
                }
            }
        }
    }

    async fn search(&self, provider: &dyn SubtitleProvider, criteria: &SearchCriteria) -> Result<ResolvedSource, String> {
        let results = provider
            .search(criteria)
            .await
            .map_err(|e| e.to_string())?;

        let subtitle = self
            .select(results)
            .ok_or_else(|| format!("No subtitles found on {}", provider.display_name()))?;

        info!("Found {} subtitle: {}", provider.display_name(), subtitle.label());
        Ok(ResolvedSource {
            subtitle,
            source: provider.name().to_string(),
        })
    }

    /// Preferred-language entry, else the first one
    fn select(&self, results: Vec<SubtitleDescriptor>) -> Option<SubtitleDescriptor> {
        let preferred = results
            .iter()
            .position(|s| s.language.as_deref() == Some(self.preferred_language.as_str()));

        match preferred {
            Some(index) => results.into_iter().nth(index),
            None => results.into_iter().next(),
        }
    }
}
