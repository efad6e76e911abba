/*!
 * Pipeline orchestrator.
 *
 * Drives one subtitle request from cache check to persisted artifact:
 * 1. Validation and artifact cache check (a hit needs no job at all)
 * 2. External id lookup (best effort)
 * 3. Up to `max_attempts` runs of search, download, translate, convert and
 *    persist, pausing `retry_delay` between attempts
 *
 * Progress is published into the `JobTracker` as the run advances. A job id
 * is derived from the cache key, so at most one run per key is in flight;
 * duplicate submissions attach to it. Subscribers to `JobTracker::subscribe`
 * see every transition in order.
 */

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::app_config::{Config, PipelineConfig};
use crate::artifact_cache::{ArtifactCache, ArtifactRef, FileStore};
use crate::database::{DatabaseConnection, Repository};
use crate::errors::PipelineError;
use crate::jobs::{JobState, JobStatus, JobTracker, Registration};
use crate::providers::download::HttpFetcher;
use crate::providers::google::GoogleTranslate;
use crate::providers::libresubs::LibreSubs;
use crate::providers::tmdb::Tmdb;
use crate::providers::wyzie::Wyzie;
use crate::providers::{ExternalIdService, SubtitleFetcher};
use crate::request::{CacheKey, SubtitleRequest};
use crate::sources::{Resolution, SourceQuery, SourceResolver};
use crate::subtitle_format::to_webvtt;
use crate::translation::{TranslationMemo, TranslationStage, TranslationThrottle};

/// Interval at which `run_job` re-checks a job it attached to
const ATTACH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Orchestration settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Total attempts of the search-through-persist sequence
    pub max_attempts: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
    /// How long terminal jobs stay pollable
    pub job_grace_period: Duration,
    /// Target language when a request names none
    pub default_language: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
            job_grace_period: config.job_grace_period(),
            default_language: config.default_language.clone(),
        }
    }
}

/// External collaborators and shared state the orchestrator drives
#[derive(Debug, Clone)]
pub struct PipelineComponents {
    pub external_ids: Arc<dyn ExternalIdService>,
    pub resolver: SourceResolver,
    pub fetcher: Arc<dyn SubtitleFetcher>,
    pub stage: TranslationStage,
    pub cache: ArtifactCache,
}

/// Immediate answer to a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The artifact already exists; no job was created
    CacheHit { artifact: ArtifactRef },
    /// A new run was started under this job id
    Started { job_id: String },
    /// A run for the same key is already in flight
    Attached { job_id: String },
}

impl SubmitOutcome {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            SubmitOutcome::CacheHit { .. } => None,
            SubmitOutcome::Started { job_id } | SubmitOutcome::Attached { job_id } => Some(job_id),
        }
    }
}

/// Final result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    CacheHit {
        artifact: ArtifactRef,
    },
    Completed {
        artifact: ArtifactRef,
        source: String,
    },
    Failed {
        error: String,
        sources_tried: Vec<String>,
    },
}

struct OrchestratorInner {
    components: PipelineComponents,
    settings: PipelineSettings,
    jobs: JobTracker,
}

/// Entry point for subtitle requests
#[derive(Clone)]
pub struct PipelineOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl PipelineOrchestrator {
    pub fn new(components: PipelineComponents, settings: PipelineSettings) -> Self {
        let jobs = JobTracker::new(settings.job_grace_period);
        Self {
            inner: Arc::new(OrchestratorInner {
                components,
                settings,
                jobs,
            }),
        }
    }

    /// Wire up the HTTP clients, filesystem store and manifest described by
    /// the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut cache = ArtifactCache::new(Arc::new(FileStore::new(&config.storage.subtitles_dir)));
        if let Some(path) = config.manifest_path()? {
            let connection = DatabaseConnection::new(&path)
                .with_context(|| format!("Failed to open artifact manifest at {:?}", path))?;
            cache = cache.with_manifest(Repository::new(connection));
        }
        if let Some(base_url) = &config.storage.public_base_url {
            cache = cache.with_public_base_url(base_url);
        }

        let stage = TranslationStage::new(
            Arc::new(GoogleTranslate::from_config(&config.translation)),
            TranslationThrottle::new(config.translation.max_concurrent_requests),
            TranslationMemo::from_config(&config.translation),
            &config.pipeline.source_language,
        );

        let resolver = SourceResolver::new(
            Arc::new(Wyzie::from_config(&config.providers)),
            Arc::new(LibreSubs::from_config(&config.providers)),
        )
        .with_preferred_language(&config.pipeline.source_language);

        let components = PipelineComponents {
            external_ids: Arc::new(Tmdb::from_config(&config.providers)),
            resolver,
            fetcher: Arc::new(HttpFetcher::new(config.providers.timeout_secs)),
            stage,
            cache,
        };

        Ok(Self::new(components, PipelineSettings::from(&config.pipeline)))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.inner.jobs
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.inner.components.cache
    }

    pub fn stage(&self) -> &TranslationStage {
        &self.inner.components.stage
    }

    /// Validate a request and derive its cache key
    pub fn cache_key_for(&self, request: &SubtitleRequest) -> Result<CacheKey, PipelineError> {
        request.cache_key(&self.inner.settings.default_language)
    }

    /// Job id a request maps to
    pub fn job_id_for(&self, request: &SubtitleRequest) -> Result<String, PipelineError> {
        Ok(self.cache_key_for(request)?.job_id())
    }

    /// Accept a request and return immediately.
    ///
    /// Invalid requests are rejected before anything else happens. A cached
    /// artifact is returned without creating a job. Otherwise the request
    /// attaches to the in-flight job for its key, or a new run is spawned.
    pub async fn submit_job(&self, request: SubtitleRequest) -> Result<SubmitOutcome, PipelineError> {
        let key = self.cache_key_for(&request)?;

        if let Some(artifact) = self.cache().lookup(&key).await? {
            info!("Subtitle found in cache for {}, serving immediately", key);
            return Ok(SubmitOutcome::CacheHit { artifact });
        }

        let job_id = key.job_id();
        match self.inner.jobs.register(&key) {
            Registration::InFlight => Ok(SubmitOutcome::Attached { job_id }),
            Registration::Completed(artifact) => {
                info!("Job {} finished while the cache was checked, serving its artifact", job_id);
                Ok(SubmitOutcome::CacheHit { artifact })
            }
            Registration::Started(run_id) => {
                info!("Processing request {} in {}", job_id, key.language_name());
                let this = self.clone();
                tokio::spawn(async move {
                    this.execute(key, run_id).await;
                });
                Ok(SubmitOutcome::Started { job_id })
            }
        }
    }

    /// Current status of a job, `None` if unknown or expired
    pub fn poll_job(&self, job_id: &str) -> Option<JobStatus> {
        self.inner.jobs.status(job_id)
    }

    /// Process a request to completion in the caller's task.
    ///
    /// Progress is still published into the job tracker. If a run for the
    /// same key is already in flight, waits for that run instead.
    pub async fn run_job(&self, request: SubtitleRequest) -> Result<PipelineOutcome, PipelineError> {
        let key = self.cache_key_for(&request)?;

        if let Some(artifact) = self.cache().lookup(&key).await? {
            return Ok(PipelineOutcome::CacheHit { artifact });
        }

        match self.inner.jobs.register(&key) {
            Registration::Started(run_id) => Ok(self.execute(key, run_id).await),
            Registration::InFlight => self.wait_for(&key).await,
            Registration::Completed(artifact) => Ok(PipelineOutcome::CacheHit { artifact }),
        }
    }

    async fn wait_for(&self, key: &CacheKey) -> Result<PipelineOutcome, PipelineError> {
        let job_id = key.job_id();
        loop {
            match self.poll_job(&job_id) {
                Some(status) if status.state == JobState::Complete => {
                    let artifact = status.artifact.unwrap_or_else(|| self.cache().artifact_ref(key));
                    return Ok(PipelineOutcome::Completed {
                        artifact,
                        source: status.source.unwrap_or_default(),
                    });
                }
                Some(status) if status.state == JobState::Failed => {
                    return Ok(PipelineOutcome::Failed {
                        error: status.message,
                        sources_tried: status.sources_tried,
                    });
                }
                Some(_) => tokio::time::sleep(ATTACH_POLL_INTERVAL).await,
                None => {
                    // Expired before we saw it finish; the cache is authoritative
                    return match self.cache().lookup(key).await? {
                        Some(artifact) => Ok(PipelineOutcome::CacheHit { artifact }),
                        None => Err(PipelineError::Storage(format!("Job {} vanished before finishing", job_id))),
                    };
                }
            }
        }
    }

    /// Run the full pipeline for a registered job
    async fn execute(&self, key: CacheKey, run_id: Uuid) -> PipelineOutcome {
        let jobs = &self.inner.jobs;
        let settings = &self.inner.settings;
        let job_id = key.job_id();
        let publish = |state: JobState, progress: u8, message: String| {
            jobs.update(&job_id, run_id, state, message, progress);
        };

        publish(JobState::FetchingImdb, 10, "Fetching IMDb ID from TMDb...".to_string());
        let external_id = match self.inner.components.external_ids.lookup(&key.catalog_id, key.kind).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to fetch IMDb ID for {}: {}", key, e);
                None
            }
        };
        info!("Fetched IMDb ID: {:?}", external_id);

        let query = SourceQuery {
            key: key.clone(),
            external_id,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(&query, run_id, &publish).await {
                Ok((artifact, source)) => {
                    jobs.complete(&job_id, run_id, artifact.clone());
                    jobs.schedule_removal(&job_id, run_id);
                    return PipelineOutcome::Completed { artifact, source };
                }
                Err(e) => {
                    warn!("Attempt {} failed: {:#}", attempt, e);
                    publish(
                        JobState::Retrying,
                        0,
                        format!("Attempt {} failed, retrying... ({:#})", attempt, e),
                    );

                    if attempt >= settings.max_attempts {
                        let sources_tried = self.inner.components.resolver.provider_names();
                        jobs.fail(
                            &job_id,
                            run_id,
                            format!("Failed after {} attempts: {:#}", settings.max_attempts, e),
                            sources_tried.clone(),
                        );
                        jobs.schedule_removal(&job_id, run_id);
                        return PipelineOutcome::Failed {
                            error: format!("{:#}", e),
                            sources_tried,
                        };
                    }

                    tokio::time::sleep(settings.retry_delay).await;
                }
            }
        }
    }

    /// One search-through-persist attempt
    async fn attempt<P>(&self, query: &SourceQuery, run_id: Uuid, publish: &P) -> Result<(ArtifactRef, String)>
    where
        P: Fn(JobState, u8, String) + Send + Sync,
    {
        let components = &self.inner.components;
        let key = &query.key;
        let language_name = key.language_name();

        publish(JobState::SearchingSubs, 20, "Searching for subtitles...".to_string());
        let resolution = components
            .resolver
            .resolve(query, |attempt| match attempt.after_failure_of {
                None => publish(
                    JobState::SearchingSubs,
                    25,
                    format!("Trying {} subtitle source...", attempt.display_name),
                ),
                Some(previous) => publish(
                    JobState::SearchingSubs,
                    30,
                    format!("{} failed, trying {}...", previous, attempt.display_name),
                ),
            })
            .await;

        let resolved = match resolution {
            Resolution::Resolved(resolved) => resolved,
            Resolution::Unresolved { error, .. } => {
                return Err(anyhow!("Both subtitle sources failed: {}", error));
            }
        };
        self.inner.jobs.set_source(&key.job_id(), run_id, &resolved.source);

        publish(
            JobState::Downloading,
            35,
            format!("Downloading subtitle from {}...", resolved.source),
        );
        let srt = components
            .fetcher
            .download(&resolved.subtitle.url)
            .await
            .context("Subtitle download failed")?;

        let translated = components
            .stage
            .translate(&srt, &key.language, &language_name, publish)
            .await;
        info!(
            "Translated {} lines ({} unique, {} from memo, {} failed) to {}",
            translated.total_lines,
            translated.unique_lines,
            translated.memo_hits,
            translated.failed_lines,
            language_name
        );
        let (hits, misses, hit_rate) = components.stage.memo().stats();
        debug!("Memo: {} hits, {} misses ({:.1}% hit rate)", hits, misses, hit_rate * 100.0);

        publish(JobState::Converting, 95, "Converting to WebVTT format...".to_string());
        let vtt = to_webvtt(&translated.content);

        let artifact = components.cache.persist(key, &vtt, &resolved.source).await?;
        Ok((artifact, resolved.source))
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("settings", &self.inner.settings)
            .field("jobs", &self.inner.jobs)
            .finish()
    }
}
