/*!
 * Subtitle requests and the cache key derived from them.
 *
 * A request names a media item by catalog id, the episode for series, and a
 * target language. Validation turns it into a `CacheKey`, which determines
 * both the artifact location and the job id.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::PipelineError;
use crate::language_utils;

/// Kind of media item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    /// Series; anime is stored and looked up like any other series
    #[serde(alias = "anime")]
    Tv,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }

    pub fn is_series(&self) -> bool {
        matches!(self, MediaKind::Tv)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie" => Ok(MediaKind::Movie),
            "tv" | "anime" => Ok(MediaKind::Tv),
            other => Err(PipelineError::InvalidMediaKind(other.to_string())),
        }
    }
}

/// A client request for a translated subtitle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleRequest {
    /// External catalog (TMDb) id
    pub catalog_id: String,

    pub kind: MediaKind,

    #[serde(default)]
    pub season: Option<u32>,

    #[serde(default)]
    pub episode: Option<u32>,

    /// Target language; the configured default applies when absent
    #[serde(default)]
    pub language: Option<String>,
}

impl SubtitleRequest {
    pub fn movie(catalog_id: impl Into<String>) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            kind: MediaKind::Movie,
            season: None,
            episode: None,
            language: None,
        }
    }

    pub fn episode(catalog_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            kind: MediaKind::Tv,
            season: Some(season),
            episode: Some(episode),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Validate the request and derive its cache key.
    ///
    /// Season and episode are ignored for movies and must be at least 1 for
    /// tv. The language must be in the
    /// supported table, matched exactly.
    pub fn cache_key(&self, default_language: &str) -> Result<CacheKey, PipelineError> {
        let catalog_id = self.catalog_id.trim();
        if catalog_id.is_empty() {
            return Err(PipelineError::MissingIdentifier("catalog_id".to_string()));
        }
        if !is_safe_segment(catalog_id) {
            return Err(PipelineError::InvalidIdentifier(catalog_id.to_string()));
        }

        let (season, episode) = match self.kind {
            MediaKind::Movie => (None, None),
            MediaKind::Tv => {
                // Numbering starts at 1; zero counts as missing
                let season = self
                    .season
                    .filter(|&n| n > 0)
                    .ok_or_else(|| PipelineError::MissingIdentifier("season".to_string()))?;
                let episode = self
                    .episode
                    .filter(|&n| n > 0)
                    .ok_or_else(|| PipelineError::MissingIdentifier("episode".to_string()))?;
                (Some(season), Some(episode))
            }
        };

        let language = self
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(default_language);

        if !language_utils::is_supported(language) {
            return Err(PipelineError::UnsupportedLanguage {
                code: language.to_string(),
            });
        }

        Ok(CacheKey {
            kind: self.kind,
            catalog_id: catalog_id.to_string(),
            season,
            episode,
            language: language.to_string(),
        })
    }
}

/// Identity of a translated artifact: (kind, catalog id, season, episode, language)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub kind: MediaKind,
    pub catalog_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub language: String,
}

impl CacheKey {
    /// Deterministic job id: `<kind>-<catalogId>-<season|0>-<episode|0>-<language>`
    pub fn job_id(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.kind,
            self.catalog_id,
            self.season.unwrap_or(0),
            self.episode.unwrap_or(0),
            self.language
        )
    }

    /// Store-relative artifact path
    pub fn relative_path(&self) -> String {
        match self.kind {
            MediaKind::Movie => format!("movies/{}/{}/subtitle.vtt", self.catalog_id, self.language),
            MediaKind::Tv => format!(
                "tvshows/{}/season{}/episode{}/{}/subtitle.vtt",
                self.catalog_id,
                self.season.unwrap_or(0),
                self.episode.unwrap_or(0),
                self.language
            ),
        }
    }

    /// English name of the target language, falling back to the code
    pub fn language_name(&self) -> String {
        language_utils::language_name(&self.language)
            .unwrap_or(&self.language)
            .to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.job_id())
    }
}

fn is_safe_segment(segment: &str) -> bool {
    segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
