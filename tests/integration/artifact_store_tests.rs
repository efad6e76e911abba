/*!
 * Integration tests for the filesystem store and the artifact manifest
 */

use anyhow::Result;
use std::fs;
use std::sync::Arc;

use subrelay::database::{DatabaseConnection, Repository};
use subrelay::{ArtifactCache, DurableStore, FileStore, PipelineOutcome, SubmitOutcome, SubtitleRequest};
use crate::common::{self, MockParts};

/// Test the full run against a real directory with a manifest
#[tokio::test]
async fn test_runJob_withFileStore_shouldWriteArtifactAndManifestRecord() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path().join("subtitles");
    let cache = ArtifactCache::new(Arc::new(FileStore::new(&root))).with_manifest(Repository::new_in_memory()?);

    let parts = MockParts::working();
    let pipeline = parts.pipeline_with_cache(cache, common::fast_settings(3, 1));
    let request = SubtitleRequest::episode("1399", 1, 2).with_language("ckb");

    let outcome = pipeline.run_job(request).await?;
    assert!(matches!(outcome, PipelineOutcome::Completed { .. }));

    let path = root.join("tvshows/1399/season1/episode2/ckb/subtitle.vtt");
    let content = fs::read_to_string(&path)?;
    assert!(content.starts_with("WEBVTT\n\n1\n00:00:01.000 --> 00:00:04.000\n"));

    let manifest = pipeline.cache().manifest().unwrap();
    let record = manifest
        .get_artifact("tvshows/1399/season1/episode2/ckb/subtitle.vtt")
        .await?
        .unwrap();
    assert_eq!(record.job_key, "tv-1399-1-2-ckb");
    assert_eq!(record.source, "wyzie");
    assert_eq!(record.content_sha256, Repository::hash_content(&content));
    assert_eq!(record.byte_len as usize, content.len());

    Ok(())
}

/// Test that artifacts survive a restart: a fresh pipeline over the same
/// directory serves them without doing any work
#[tokio::test]
async fn test_submitJob_afterRestart_shouldServeFromDisk() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path().join("subtitles");

    let first = MockParts::working();
    first
        .pipeline_with_cache(ArtifactCache::new(Arc::new(FileStore::new(&root))), common::fast_settings(3, 1))
        .run_job(SubtitleRequest::movie("550").with_language("fr"))
        .await?;

    let second = MockParts::working();
    let restarted =
        second.pipeline_with_cache(ArtifactCache::new(Arc::new(FileStore::new(&root))), common::fast_settings(3, 1));
    let outcome = restarted.submit_job(SubtitleRequest::movie("550").with_language("fr")).await?;

    assert!(matches!(outcome, SubmitOutcome::CacheHit { .. }));
    assert_eq!(second.primary.request_count(), 0);
    assert_eq!(second.external_ids.request_count(), 0);
    assert!(restarted.jobs().is_empty());

    Ok(())
}

/// Test that an existing artifact is never overwritten
#[tokio::test]
async fn test_persist_withExistingArtifact_shouldKeepOriginal() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let cache = ArtifactCache::new(Arc::new(FileStore::new(temp_dir.path())));
    let key = SubtitleRequest::movie("550").with_language("fr").cache_key("ckb")?;

    cache.persist(&key, "WEBVTT\n\nfirst", "wyzie").await?;
    cache.persist(&key, "WEBVTT\n\nsecond", "libresubs").await?;

    assert_eq!(cache.read(&key).await?.as_deref(), Some("WEBVTT\n\nfirst"));
    Ok(())
}

/// Test that the manifest persists across connections to the same file
#[tokio::test]
async fn test_manifest_onDisk_shouldListArtifactsAfterReopen() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let db_path = temp_dir.path().join("state").join("manifest.db");
    let root = temp_dir.path().join("subtitles");

    {
        let cache = ArtifactCache::new(Arc::new(FileStore::new(&root)))
            .with_manifest(Repository::new(DatabaseConnection::new(&db_path)?));
        let parts = MockParts::working();
        let pipeline = parts.pipeline_with_cache(cache, common::fast_settings(3, 1));
        pipeline.run_job(SubtitleRequest::movie("550").with_language("fr")).await?;
        pipeline.run_job(SubtitleRequest::movie("550").with_language("de")).await?;
    }

    let reopened = Repository::new(DatabaseConnection::new(&db_path)?);
    let paths: Vec<String> = reopened
        .list_artifacts()
        .await?
        .into_iter()
        .map(|record| record.relative_path)
        .collect();
    assert_eq!(paths.len(), 2);
    assert!(paths.contains(&"movies/550/fr/subtitle.vtt".to_string()));
    assert!(paths.contains(&"movies/550/de/subtitle.vtt".to_string()));

    let german = reopened.list_artifacts_for_language("de").await?;
    assert_eq!(german.len(), 1);

    let store = FileStore::new(&root);
    assert_eq!(
        store.list().await?,
        vec!["movies/550/de/subtitle.vtt".to_string(), "movies/550/fr/subtitle.vtt".to_string()]
    );

    Ok(())
}
