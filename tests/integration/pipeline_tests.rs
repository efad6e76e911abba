/*!
 * Integration tests for the pipeline orchestrator over mock collaborators
 */

use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use subrelay::jobs::Registration;
use subrelay::providers::mock::{MockBackend, MockExternalIds, MockFetcher, MockSubtitleProvider};
use subrelay::{ArtifactRef, JobEvent, JobState, PipelineError, PipelineOutcome, SubmitOutcome, SubtitleRequest};
use crate::common::{self, MockParts, SAMPLE_SRT, SOURCE_URL};

fn french_movie() -> SubtitleRequest {
    SubtitleRequest::movie("550").with_language("fr")
}

/// Drain every transition received so far
fn drain(events: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

fn checkpoints(events: &[JobEvent]) -> Vec<(JobState, u8)> {
    events.iter().map(|event| (event.state, event.progress)).collect()
}

/// Test that a finished artifact is served again without touching any collaborator
#[tokio::test]
async fn test_submitJob_afterCompletion_shouldReturnCacheHitWithoutWork() {
    let parts = MockParts::working();
    let pipeline = parts.pipeline(common::fast_settings(3, 1));

    let first = pipeline.run_job(french_movie()).await.unwrap();
    assert!(matches!(first, PipelineOutcome::Completed { .. }));

    let searches = parts.primary.request_count();
    let downloads = parts.fetcher.request_count();
    let translations = parts.backend.request_count();

    let second = pipeline.submit_job(french_movie()).await.unwrap();

    match second {
        SubmitOutcome::CacheHit { artifact } => assert_eq!(artifact.relative_path, "movies/550/fr/subtitle.vtt"),
        other => panic!("expected cache hit, got {:?}", other),
    }
    assert_eq!(parts.primary.request_count(), searches);
    assert_eq!(parts.fetcher.request_count(), downloads);
    assert_eq!(parts.backend.request_count(), translations);
}

/// Test that duplicate submissions attach to the running job
#[tokio::test]
async fn test_submitJob_whileInFlight_shouldAttachToExistingJob() {
    let mut parts = MockParts::working();
    parts.backend = MockBackend::slow(50);
    let pipeline = parts.pipeline(common::fast_settings(3, 1));

    let first = pipeline.submit_job(french_movie()).await.unwrap();
    let second = pipeline.submit_job(french_movie()).await.unwrap();

    assert_eq!(first, SubmitOutcome::Started { job_id: "movie-550-0-0-fr".to_string() });
    assert_eq!(second, SubmitOutcome::Attached { job_id: "movie-550-0-0-fr".to_string() });
    assert_eq!(pipeline.jobs().len(), 1);

    let status = common::wait_for_terminal(&pipeline, "movie-550-0-0-fr").await;

    assert_eq!(status.state, JobState::Complete);
    assert_eq!(parts.primary.request_count(), 1);
    assert_eq!(parts.fetcher.request_count(), 1);
}

/// Test that a completed job reports its artifact and final message
#[tokio::test]
async fn test_pollJob_afterCompletion_shouldReportArtifact() {
    let parts = MockParts::working();
    let pipeline = parts.pipeline(common::fast_settings(3, 1));

    let job_id = match pipeline.submit_job(french_movie()).await.unwrap() {
        SubmitOutcome::Started { job_id } => job_id,
        other => panic!("expected a new job, got {:?}", other),
    };
    let status = common::wait_for_terminal(&pipeline, &job_id).await;

    assert_eq!(status.state, JobState::Complete);
    assert_eq!(status.progress, 100);
    assert_eq!(status.message, "Subtitle in French ready!");
    assert_eq!(status.source.as_deref(), Some("wyzie"));
    assert_eq!(
        status.artifact.map(|a| a.relative_path),
        Some("movies/550/fr/subtitle.vtt".to_string())
    );
}

/// Test that the stored artifact is WebVTT with translated dialogue and intact structure
#[tokio::test]
async fn test_runJob_shouldStoreTranslatedWebvtt() {
    let parts = MockParts::working();
    let pipeline = parts.pipeline(common::fast_settings(3, 1));
    let request = SubtitleRequest::episode("1399", 2, 3).with_language("de");

    pipeline.run_job(request.clone()).await.unwrap();

    let key = pipeline.cache_key_for(&request).unwrap();
    let content = pipeline.cache().read(&key).await.unwrap().unwrap();
    assert_eq!(
        content,
        "WEBVTT\n\n1\n00:00:01.000 --> 00:00:04.000\n[de] This is a test subtitle.\n\n2\n00:00:05.000 --> 00:00:09.000\n[de] It contains multiple entries.\n\n3\n00:00:10.000 --> 00:00:14.000\n[de] This is a test subtitle.\n"
    );
    // Repeated dialogue is translated once
    assert_eq!(parts.backend.request_count(), 2);
}

/// Test that the fallback provider is used when the primary finds nothing
#[tokio::test]
async fn test_runJob_whenPrimaryEmpty_shouldUseFallback() {
    let mut parts = MockParts::working();
    parts.primary = MockSubtitleProvider::empty("wyzie");
    parts.fallback = MockSubtitleProvider::with_results(
        "libresubs",
        vec![MockSubtitleProvider::descriptor("en", SOURCE_URL)],
    );
    let pipeline = parts.pipeline(common::fast_settings(3, 1));

    let outcome = pipeline.run_job(french_movie()).await.unwrap();

    assert!(matches!(outcome, PipelineOutcome::Completed { ref source, .. } if source == "libresubs"));
    assert_eq!(parts.primary.request_count(), 1);
    assert_eq!(parts.fallback.request_count(), 1);
    assert_eq!(
        pipeline.poll_job("movie-550-0-0-fr").unwrap().source.as_deref(),
        Some("libresubs")
    );
}

/// Test that the external id is used for the primary search only
#[tokio::test]
async fn test_runJob_withExternalId_shouldSearchPrimaryByExternalId() {
    let mut parts = MockParts::working();
    parts.external_ids = MockExternalIds::returning("tt0137523");
    let pipeline = parts.pipeline(common::fast_settings(3, 1));

    pipeline.run_job(french_movie()).await.unwrap();

    assert_eq!(parts.external_ids.request_count(), 1);
    assert_eq!(parts.primary.received_criteria()[0].id, "tt0137523");
}

/// Test that a failing external id lookup does not stop the pipeline
#[tokio::test]
async fn test_runJob_whenExternalIdLookupFails_shouldContinueWithCatalogId() {
    let mut parts = MockParts::working();
    parts.external_ids = MockExternalIds::failing();
    let pipeline = parts.pipeline(common::fast_settings(3, 1));

    let outcome = pipeline.run_job(french_movie()).await.unwrap();

    assert!(matches!(outcome, PipelineOutcome::Completed { .. }));
    assert_eq!(parts.primary.received_criteria()[0].id, "550");
}

/// Test that retries stop after exactly max_attempts with the delay between them
#[tokio::test]
async fn test_runJob_whenSourcesKeepFailing_shouldFailAfterMaxAttempts() {
    let mut parts = MockParts::working();
    parts.primary = MockSubtitleProvider::failing("wyzie");
    parts.fallback = MockSubtitleProvider::empty("libresubs");
    let pipeline = parts.pipeline(common::fast_settings(3, 20));

    let started = Instant::now();
    let outcome = pipeline.run_job(french_movie()).await.unwrap();
    let elapsed = started.elapsed();

    match outcome {
        PipelineOutcome::Failed { error, sources_tried } => {
            assert_eq!(error, "Both subtitle sources failed: No subtitles found on libresubs");
            assert_eq!(sources_tried, vec!["wyzie", "libresubs"]);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(parts.primary.request_count(), 3);
    assert_eq!(parts.fallback.request_count(), 3);
    assert!(elapsed >= Duration::from_millis(40), "elapsed {:?}", elapsed);

    let status = pipeline.poll_job("movie-550-0-0-fr").unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.progress, 0);
    assert_eq!(
        status.message,
        "Failed after 3 attempts: Both subtitle sources failed: No subtitles found on libresubs"
    );
    assert_eq!(status.sources_tried, vec!["wyzie", "libresubs"]);
    assert_eq!(parts.fetcher.request_count(), 0);
}

/// Test that a transient download failure is recovered by the next attempt
#[tokio::test]
async fn test_runJob_whenFirstDownloadFails_shouldRecoverOnRetry() {
    let mut parts = MockParts::working();
    parts.fetcher = MockFetcher::new().with_body(SOURCE_URL, SAMPLE_SRT).fail_first(1);
    let pipeline = parts.pipeline(common::fast_settings(3, 1));

    let outcome = pipeline.run_job(french_movie()).await.unwrap();

    assert!(matches!(outcome, PipelineOutcome::Completed { .. }));
    assert_eq!(parts.fetcher.request_count(), 2);
    assert_eq!(parts.primary.request_count(), 2);
}

/// Test that failing translations degrade to the original text instead of failing the job
#[tokio::test]
async fn test_runJob_whenBackendFails_shouldKeepOriginalLines() {
    let mut parts = MockParts::working();
    parts.backend = MockBackend::failing();
    let pipeline = parts.pipeline(common::fast_settings(3, 1));

    let outcome = pipeline.run_job(french_movie()).await.unwrap();
    assert!(matches!(outcome, PipelineOutcome::Completed { .. }));

    let key = pipeline.cache_key_for(&french_movie()).unwrap();
    let content = pipeline.cache().read(&key).await.unwrap().unwrap();
    assert!(content.contains("\nThis is a test subtitle.\n"));
    assert!(!content.contains("[fr]"));
}

/// Test that invalid requests never create a job or reach a collaborator
#[tokio::test]
async fn test_submitJob_withInvalidRequests_shouldRejectUpFront() {
    let parts = MockParts::working();
    let pipeline = parts.pipeline(common::fast_settings(3, 1));

    let mut missing_season = SubtitleRequest::episode("1399", 1, 1);
    missing_season.season = None;

    assert_eq!(
        pipeline.submit_job(missing_season).await,
        Err(PipelineError::MissingIdentifier("season".to_string()))
    );
    assert_eq!(
        pipeline.submit_job(SubtitleRequest::movie("  ")).await,
        Err(PipelineError::MissingIdentifier("catalog_id".to_string()))
    );
    assert_eq!(
        pipeline.submit_job(SubtitleRequest::movie("../etc")).await,
        Err(PipelineError::InvalidIdentifier("../etc".to_string()))
    );
    assert_eq!(
        pipeline.run_job(SubtitleRequest::movie("550").with_language("xx")).await,
        Err(PipelineError::UnsupportedLanguage { code: "xx".to_string() })
    );

    assert!(pipeline.jobs().is_empty());
    assert_eq!(parts.primary.request_count(), 0);
    assert_eq!(parts.external_ids.request_count(), 0);
}

/// Test that terminal jobs disappear after the grace period
#[tokio::test]
async fn test_pollJob_afterGracePeriod_shouldReturnNone() {
    let parts = MockParts::working();
    let mut settings = common::fast_settings(3, 1);
    settings.job_grace_period = Duration::from_millis(30);
    let pipeline = parts.pipeline(settings);

    pipeline.run_job(french_movie()).await.unwrap();
    assert!(pipeline.poll_job("movie-550-0-0-fr").is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(pipeline.poll_job("movie-550-0-0-fr").is_none());
    assert!(pipeline.poll_job("movie-does-not-exist").is_none());
}

/// Test that a failed job is replaced by a new run on resubmission
#[tokio::test]
async fn test_submitJob_afterFailure_shouldStartFreshRun() {
    let mut parts = MockParts::working();
    parts.primary = MockSubtitleProvider::with_results(
        "wyzie",
        vec![MockSubtitleProvider::descriptor("en", SOURCE_URL)],
    )
    .fail_first(1);
    let pipeline = parts.pipeline(common::fast_settings(1, 1));

    let first = pipeline.run_job(french_movie()).await.unwrap();
    assert!(matches!(first, PipelineOutcome::Failed { .. }));
    assert_eq!(pipeline.poll_job("movie-550-0-0-fr").unwrap().state, JobState::Failed);

    let second = pipeline.submit_job(french_movie()).await.unwrap();
    assert_eq!(second, SubmitOutcome::Started { job_id: "movie-550-0-0-fr".to_string() });

    let status = common::wait_for_terminal(&pipeline, "movie-550-0-0-fr").await;
    assert_eq!(status.state, JobState::Complete);
    assert!(status.sources_tried.is_empty());
}

/// Test that jobs for different languages run side by side within the throttle limit
#[tokio::test]
async fn test_submitJob_forSeveralLanguages_shouldRespectThrottle() {
    let mut parts = MockParts::working();
    parts.backend = MockBackend::slow(10);
    parts.max_concurrent = 2;
    let pipeline = parts.pipeline(common::fast_settings(3, 1));

    let languages = ["fr", "de", "es", "it"];
    for language in languages {
        let outcome = pipeline
            .submit_job(SubtitleRequest::movie("550").with_language(language))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Started { .. }));
    }

    for language in languages {
        let status = common::wait_for_terminal(&pipeline, &format!("movie-550-0-0-{}", language)).await;
        assert_eq!(status.state, JobState::Complete);
    }

    assert_eq!(parts.backend.request_count(), 8);
    assert!(parts.backend.peak_in_flight() <= 2);
}

/// Test that run_job waits for an in-flight run instead of starting another
#[tokio::test]
async fn test_runJob_whileInFlight_shouldWaitForExistingRun() {
    let mut parts = MockParts::working();
    parts.backend = MockBackend::slow(30);
    let pipeline = parts.pipeline(common::fast_settings(3, 1));

    pipeline.submit_job(french_movie()).await.unwrap();
    let outcome = pipeline.run_job(french_movie()).await.unwrap();

    assert!(matches!(outcome, PipelineOutcome::Completed { ref source, .. } if source == "wyzie"));
    assert_eq!(parts.primary.request_count(), 1);
}

/// Test the exact progress checkpoints of a run that falls back to the second provider
#[tokio::test]
async fn test_runJob_withFallback_shouldPublishCheckpointsInOrder() {
    let mut parts = MockParts::working();
    parts.primary = MockSubtitleProvider::empty("wyzie");
    parts.fallback = MockSubtitleProvider::with_results(
        "libresubs",
        vec![MockSubtitleProvider::descriptor("en", SOURCE_URL)],
    );
    let pipeline = parts.pipeline(common::fast_settings(3, 1));
    let mut events = pipeline.jobs().subscribe();

    pipeline.run_job(french_movie()).await.unwrap();

    let events = drain(&mut events);
    assert!(events.iter().all(|event| event.job_id == "movie-550-0-0-fr"));
    assert_eq!(
        checkpoints(&events),
        vec![
            (JobState::Starting, 0),
            (JobState::FetchingImdb, 10),
            (JobState::SearchingSubs, 20),
            (JobState::SearchingSubs, 25),
            (JobState::SearchingSubs, 30),
            (JobState::Downloading, 35),
            (JobState::Translating, 40),
            (JobState::Translating, 50),
            (JobState::Translating, 70),
            (JobState::Translating, 90),
            (JobState::Finalizing, 95),
            (JobState::Converting, 95),
            (JobState::Complete, 100),
        ]
    );
    assert_eq!(events[3].message, "Trying wyzie subtitle source...");
    assert_eq!(events[4].message, "wyzie failed, trying libresubs...");
    assert_eq!(events[5].message, "Downloading subtitle from libresubs...");
    assert_eq!(events[11].message, "Converting to WebVTT format...");
    assert_eq!(events[12].message, "Subtitle in French ready!");
}

/// Test that a failed attempt publishes a retrying transition before the next attempt
#[tokio::test]
async fn test_runJob_whenFirstAttemptFails_shouldPublishRetryingThenRestart() {
    let mut parts = MockParts::working();
    parts.fetcher = MockFetcher::new().with_body(SOURCE_URL, SAMPLE_SRT).fail_first(1);
    let pipeline = parts.pipeline(common::fast_settings(3, 1));
    let mut events = pipeline.jobs().subscribe();

    pipeline.run_job(french_movie()).await.unwrap();

    let events = drain(&mut events);
    assert_eq!(
        checkpoints(&events),
        vec![
            (JobState::Starting, 0),
            (JobState::FetchingImdb, 10),
            (JobState::SearchingSubs, 20),
            (JobState::SearchingSubs, 25),
            (JobState::Downloading, 35),
            (JobState::Retrying, 0),
            (JobState::SearchingSubs, 20),
            (JobState::SearchingSubs, 25),
            (JobState::Downloading, 35),
            (JobState::Translating, 40),
            (JobState::Translating, 50),
            (JobState::Translating, 70),
            (JobState::Translating, 90),
            (JobState::Finalizing, 95),
            (JobState::Converting, 95),
            (JobState::Complete, 100),
        ]
    );
    assert_eq!(
        events[5].message,
        "Attempt 1 failed, retrying... (Subtitle download failed: API responded with error: 503 - Simulated download failure)"
    );
}

/// Test that a job completed between the cache check and registration is served, not rerun
#[tokio::test]
async fn test_submitJob_whenJobCompletedAfterCacheMiss_shouldServeArtifactWithoutNewRun() {
    let parts = MockParts::working();
    let pipeline = parts.pipeline(common::fast_settings(3, 1));
    let key = pipeline.cache_key_for(&french_movie()).unwrap();
    let job_id = key.job_id();

    // A concurrent run finishes, but the artifact is not visible in the store yet
    let run_id = match pipeline.jobs().register(&key) {
        Registration::Started(run_id) => run_id,
        other => panic!("expected a new job, got {:?}", other),
    };
    let artifact = ArtifactRef::new(key.relative_path(), None);
    pipeline.jobs().complete(&job_id, run_id, artifact.clone());

    let outcome = pipeline.submit_job(french_movie()).await.unwrap();

    assert_eq!(outcome, SubmitOutcome::CacheHit { artifact: artifact.clone() });
    assert_eq!(pipeline.run_job(french_movie()).await.unwrap(), PipelineOutcome::CacheHit { artifact });
    assert_eq!(pipeline.jobs().owner(&job_id), Some(run_id));
    assert_eq!(pipeline.poll_job(&job_id).unwrap().state, JobState::Complete);
    assert_eq!(parts.primary.request_count(), 0);
    assert_eq!(parts.external_ids.request_count(), 0);
}
