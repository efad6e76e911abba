/*!
 * Common test utilities for the subrelay test suite
 */

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use subrelay::providers::mock::{MockBackend, MockExternalIds, MockFetcher, MockSubtitleProvider};
use subrelay::{
    ArtifactCache, JobStatus, MemoryStore, PipelineComponents, PipelineOrchestrator, PipelineSettings,
    SourceResolver, TranslationMemo, TranslationStage, TranslationThrottle,
};

/// URL the default primary provider points at
pub const SOURCE_URL: &str = "https://subs.test/550/en.srt";

/// Small SRT document with one repeated line
pub const SAMPLE_SRT: &str = "1\n00:00:01,000 --> 00:00:04,000\nThis is a test subtitle.\n\n2\n00:00:05,000 --> 00:00:09,000\nIt contains multiple entries.\n\n3\n00:00:10,000 --> 00:00:14,000\nThis is a test subtitle.\n";

/// Route `log` output through the test harness; honors `RUST_LOG`
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Mock collaborators for one pipeline. Clones share counters, so keep a
/// clone around to assert on after building.
#[derive(Debug, Clone)]
pub struct MockParts {
    pub external_ids: MockExternalIds,
    pub primary: MockSubtitleProvider,
    pub fallback: MockSubtitleProvider,
    pub fetcher: MockFetcher,
    pub backend: MockBackend,
    pub max_concurrent: usize,
}

impl MockParts {
    /// Everything succeeds: the primary provider finds an English subtitle
    pub fn working() -> Self {
        Self {
            external_ids: MockExternalIds::missing(),
            primary: MockSubtitleProvider::with_results(
                "wyzie",
                vec![MockSubtitleProvider::descriptor("en", SOURCE_URL)],
            ),
            fallback: MockSubtitleProvider::empty("libresubs"),
            fetcher: MockFetcher::new().with_body(SOURCE_URL, SAMPLE_SRT),
            backend: MockBackend::working(),
            max_concurrent: 4,
        }
    }

    pub fn components(&self, cache: ArtifactCache) -> PipelineComponents {
        PipelineComponents {
            external_ids: Arc::new(self.external_ids.clone()),
            resolver: SourceResolver::new(Arc::new(self.primary.clone()), Arc::new(self.fallback.clone())),
            fetcher: Arc::new(self.fetcher.clone()),
            stage: TranslationStage::new(
                Arc::new(self.backend.clone()),
                TranslationThrottle::new(self.max_concurrent),
                TranslationMemo::new(1_000, Duration::from_secs(60)),
                "en",
            ),
            cache,
        }
    }

    /// Build a pipeline over an in-memory store
    pub fn pipeline(&self, settings: PipelineSettings) -> PipelineOrchestrator {
        self.pipeline_with_cache(ArtifactCache::new(Arc::new(MemoryStore::new())), settings)
    }

    pub fn pipeline_with_cache(&self, cache: ArtifactCache, settings: PipelineSettings) -> PipelineOrchestrator {
        init_logging();
        PipelineOrchestrator::new(self.components(cache), settings)
    }
}

/// Settings with short delays for tests
pub fn fast_settings(max_attempts: u32, retry_delay_ms: u64) -> PipelineSettings {
    PipelineSettings {
        max_attempts,
        retry_delay: Duration::from_millis(retry_delay_ms),
        job_grace_period: Duration::from_secs(60),
        default_language: "ckb".to_string(),
    }
}

/// Poll a job until it reaches a terminal state
pub async fn wait_for_terminal(pipeline: &PipelineOrchestrator, job_id: &str) -> JobStatus {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(status) = pipeline.poll_job(job_id) {
            if status.state.is_terminal() {
                return status;
            }
        }
        assert!(Instant::now() < deadline, "job {} did not finish in time", job_id);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
