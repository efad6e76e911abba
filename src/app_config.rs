use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;
use std::time::Duration;

use crate::language_utils;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Where finished artifacts live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Orchestration settings (retries, job lifetime, languages)
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Translation backend and throttle settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Metadata and subtitle search services
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Artifact storage configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the subtitle store
    #[serde(default = "default_subtitles_dir")]
    pub subtitles_dir: PathBuf,

    /// Whether to keep an SQLite manifest of persisted artifacts
    #[serde(default = "default_true")]
    pub manifest_enabled: bool,

    /// Manifest location; defaults to the platform data directory
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,

    /// Public base URL artifacts are served under (e.g. "https://host/subtitles")
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            subtitles_dir: default_subtitles_dir(),
            manifest_enabled: true,
            manifest_path: None,
            public_base_url: None,
        }
    }
}

/// Pipeline orchestration configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Total attempts of the search-through-persist sequence
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// How long a terminal job stays pollable
    #[serde(default = "default_job_grace_period_secs")]
    pub job_grace_period_secs: u64,

    /// Language of the source subtitles
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language used when a request does not name one
    #[serde(default = "default_target_language")]
    pub default_language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            job_grace_period_secs: default_job_grace_period_secs(),
            source_language: default_source_language(),
            default_language: default_target_language(),
        }
    }
}

impl PipelineConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn job_grace_period(&self) -> Duration {
        Duration::from_secs(self.job_grace_period_secs)
    }
}

/// Translation backend configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Maximum number of in-flight backend calls
    #[serde(default = "default_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Maximum number of memoized translations
    #[serde(default = "default_memo_capacity")]
    pub memo_capacity: u64,

    /// Memo entries unused for this long are evicted
    #[serde(default = "default_memo_idle_secs")]
    pub memo_idle_secs: u64,

    /// Service URL
    #[serde(default = "default_translate_endpoint")]
    pub endpoint: String,

    /// API key
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_concurrent_requests(),
            memo_capacity: default_memo_capacity(),
            memo_idle_secs: default_memo_idle_secs(),
            endpoint: default_translate_endpoint(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// External metadata and subtitle search services
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProvidersConfig {
    // @field: TMDb API key used for external id lookup
    #[serde(default = "String::new")]
    pub tmdb_api_key: String,

    // @field: TMDb API base URL
    #[serde(default = "default_tmdb_endpoint")]
    pub tmdb_endpoint: String,

    // @field: Primary subtitle search service
    #[serde(default = "default_wyzie_endpoint")]
    pub wyzie_endpoint: String,

    // @field: Fallback subtitle search service
    #[serde(default = "default_libresubs_endpoint")]
    pub libresubs_endpoint: String,

    // @field: Timeout seconds for search and download requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: String::new(),
            tmdb_endpoint: default_tmdb_endpoint(),
            wyzie_endpoint: default_wyzie_endpoint(),
            libresubs_endpoint: default_libresubs_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Environment variable holding the TMDb API key
pub const TMDB_KEY_ENV: &str = "TMDB_KEY";

/// Environment variable holding the translation API key
pub const TRANSLATE_KEY_ENV: &str = "GOOGLE_TRANSLATE_KEY";

fn default_subtitles_dir() -> PathBuf {
    PathBuf::from("subtitles")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    3000
}

fn default_job_grace_period_secs() -> u64 {
    5 * 60
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    language_utils::DEFAULT_TARGET_LANGUAGE.to_string()
}

fn default_concurrent_requests() -> usize {
    10
}

fn default_memo_capacity() -> u64 {
    100_000
}

fn default_memo_idle_secs() -> u64 {
    24 * 60 * 60
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_translate_endpoint() -> String {
    "https://translate-pa.googleapis.com/v1/translate".to_string()
}

fn default_tmdb_endpoint() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_wyzie_endpoint() -> String {
    "https://sub.wyzie.ru/search".to_string()
}

fn default_libresubs_endpoint() -> String {
    "https://libre-subs.fifthwit.net/search".to_string()
}

impl Config {
    /// Fill API keys from the environment when the config file leaves them empty
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.providers.tmdb_api_key.is_empty() {
            if let Some(key) = lookup(TMDB_KEY_ENV).filter(|k| !k.is_empty()) {
                self.providers.tmdb_api_key = key;
            }
        }

        if self.translation.api_key.is_empty() {
            if let Some(key) = lookup(TRANSLATE_KEY_ENV).filter(|k| !k.is_empty()) {
                self.translation.api_key = key;
            }
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let _source_name = language_utils::source_language_name(&self.pipeline.source_language)?;

        if !language_utils::is_supported(&self.pipeline.default_language) {
            return Err(anyhow!(
                "Default language '{}' is not a supported target language",
                self.pipeline.default_language
            ));
        }

        if self.pipeline.max_attempts == 0 {
            return Err(anyhow!("pipeline.max_attempts must be at least 1"));
        }

        if self.translation.max_concurrent_requests == 0 {
            return Err(anyhow!("translation.max_concurrent_requests must be at least 1"));
        }

        if self.translation.memo_capacity == 0 {
            return Err(anyhow!("translation.memo_capacity must be at least 1"));
        }

        if self.storage.subtitles_dir.as_os_str().is_empty() {
            return Err(anyhow!("storage.subtitles_dir cannot be empty"));
        }

        Ok(())
    }

    /// Resolve the manifest database path, if the manifest is enabled
    pub fn manifest_path(&self) -> Result<Option<PathBuf>> {
        if !self.storage.manifest_enabled {
            return Ok(None);
        }

        match &self.storage.manifest_path {
            Some(path) => Ok(Some(path.clone())),
            None => crate::database::DatabaseConnection::default_database_path().map(Some),
        }
    }
}
