/*!
 * # subrelay - on-demand subtitle fetch, translation and caching
 *
 * Given a catalog id (a movie, or a tv episode) and a target language,
 * subrelay finds a source subtitle, translates its dialogue, converts it to
 * WebVTT and stores the result durably so later requests are served
 * immediately.
 *
 * ## Features
 *
 * - Primary/fallback subtitle search (Wyzie, then LibreSubs)
 * - Line-level translation with deduplication, a bounded memo and a
 *   concurrency-limited FIFO queue in front of the backend
 * - Write-once artifact cache with an optional SQLite manifest
 * - Pollable jobs with progress, one in-flight run per request key
 * - Bounded retries with a fixed delay
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `request`: Requests, cache keys and job ids
 * - `language_utils`: Supported target languages
 * - `subtitle_format`: SRT line classification and WebVTT conversion
 * - `translation`: Throttle, memo and the translation stage
 * - `sources`: Source subtitle resolution with fallback
 * - `artifact_cache`: Durable artifact storage
 * - `database`: Artifact manifest (SQLite)
 * - `jobs`: Job registry for polling clients
 * - `pipeline`: The orchestrator tying everything together
 * - `providers`: Clients for the external services, plus mocks
 * - `file_utils`: File system operations
 * - `errors`: Custom error types for the application
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod artifact_cache;
pub mod database;
pub mod errors;
pub mod file_utils;
pub mod jobs;
pub mod language_utils;
pub mod pipeline;
pub mod providers;
pub mod request;
pub mod sources;
pub mod subtitle_format;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use artifact_cache::{ArtifactCache, ArtifactRef, DurableStore, FileStore, MemoryStore};
pub use errors::{PipelineError, ProviderError};
pub use jobs::{JobEvent, JobState, JobStatus, JobTracker};
pub use pipeline::{PipelineComponents, PipelineOrchestrator, PipelineOutcome, PipelineSettings, SubmitOutcome};
pub use request::{CacheKey, MediaKind, SubtitleRequest};
pub use sources::SourceResolver;
pub use translation::{TranslationMemo, TranslationStage, TranslationThrottle};
