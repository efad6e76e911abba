/*!
 * Tests for configuration files and config-driven pipeline wiring
 */

use anyhow::Result;
use std::fs;
use std::time::Duration;

use subrelay::app_config::{Config, LogLevel};
use subrelay::{PipelineError, PipelineOrchestrator, SubmitOutcome, SubtitleRequest};
use crate::common;

fn config_in(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.storage.subtitles_dir = dir.join("subtitles");
    config.storage.manifest_path = Some(dir.join("manifest.db"));
    config
}

/// Test that a default config survives a save/load cycle through a file
#[test]
fn test_config_saveAndLoad_shouldRoundTrip() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let mut config = Config::default();
    config.log_level = LogLevel::Warn;
    config.storage.public_base_url = Some("https://cdn.test/subtitles".to_string());
    fs::write(&path, serde_json::to_string_pretty(&config)?)?;

    let loaded: Config = serde_json::from_str(&fs::read_to_string(&path)?)?;

    assert_eq!(loaded.log_level, LogLevel::Warn);
    assert_eq!(loaded.storage.public_base_url.as_deref(), Some("https://cdn.test/subtitles"));
    assert_eq!(loaded.pipeline.max_attempts, config.pipeline.max_attempts);
    assert_eq!(loaded.translation.memo_capacity, config.translation.memo_capacity);
    assert!(loaded.validate().is_ok());

    Ok(())
}

/// Test that an invalid source language is rejected
#[test]
fn test_config_validate_withInvalidSourceLanguage_shouldFail() {
    let mut config = Config::default();
    config.pipeline.source_language = "xx-invalid".to_string();
    assert!(config.validate().is_err());
}

/// Test that an explicit manifest path is used as is
#[test]
fn test_config_manifestPath_withExplicitPath_shouldUseIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = config_in(temp_dir.path());

    assert_eq!(config.manifest_path()?, Some(temp_dir.path().join("manifest.db")));
    Ok(())
}

/// Test that the pipeline built from config carries the configured settings
#[tokio::test]
async fn test_pipeline_fromConfig_shouldApplySettings() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = config_in(temp_dir.path());
    config.pipeline.max_attempts = 2;
    config.pipeline.retry_delay_ms = 10;
    config.translation.max_concurrent_requests = 3;

    let pipeline = PipelineOrchestrator::from_config(&config)?;

    assert_eq!(pipeline.settings().max_attempts, 2);
    assert_eq!(pipeline.settings().retry_delay, Duration::from_millis(10));
    assert_eq!(pipeline.settings().default_language, "ckb");
    assert_eq!(pipeline.stage().throttle().max_concurrent(), 3);
    assert!(pipeline.cache().manifest().is_some());
    assert!(temp_dir.path().join("manifest.db").exists());

    Ok(())
}

/// Test that an artifact already on disk is served without any network access
#[tokio::test]
async fn test_pipeline_fromConfig_withArtifactOnDisk_shouldServeCacheHit() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = config_in(temp_dir.path());
    config.storage.public_base_url = Some("https://cdn.test/subtitles".to_string());

    let artifact_path = config.storage.subtitles_dir.join("movies/550/fr/subtitle.vtt");
    fs::create_dir_all(artifact_path.parent().unwrap())?;
    fs::write(&artifact_path, "WEBVTT\n\n")?;

    let pipeline = PipelineOrchestrator::from_config(&config)?;
    let outcome = pipeline
        .submit_job(SubtitleRequest::movie("550").with_language("fr"))
        .await?;

    match outcome {
        SubmitOutcome::CacheHit { artifact } => {
            assert_eq!(artifact.relative_path, "movies/550/fr/subtitle.vtt");
            assert_eq!(
                artifact.public_url.as_deref(),
                Some("https://cdn.test/subtitles/movies/550/fr/subtitle.vtt")
            );
        }
        other => panic!("expected cache hit, got {:?}", other),
    }
    assert!(pipeline.jobs().is_empty());

    Ok(())
}

/// Test that invalid requests are rejected before anything else happens
#[tokio::test]
async fn test_pipeline_fromConfig_withMissingEpisode_shouldReject() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let pipeline = PipelineOrchestrator::from_config(&config_in(temp_dir.path()))?;

    let mut request = SubtitleRequest::episode("1399", 1, 1);
    request.episode = None;

    assert_eq!(
        pipeline.submit_job(request).await,
        Err(PipelineError::MissingIdentifier("episode".to_string()))
    );
    Ok(())
}
