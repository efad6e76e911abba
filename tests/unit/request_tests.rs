/*!
 * Tests for requests, job ids and the client-facing status shapes
 */

use serde_json::json;
use std::time::Duration;

use subrelay::jobs::Registration;
use subrelay::{ArtifactRef, JobTracker, MediaKind, PipelineError, SubmitOutcome, SubtitleRequest};

/// Test that anime and tv requests for the same episode share one job id
#[test]
fn test_jobId_withAnimeAndTvSpellings_shouldMatch() {
    let anime: SubtitleRequest = serde_json::from_value(json!({
        "catalog_id": "37854",
        "kind": "anime",
        "season": 1,
        "episode": 4,
        "language": "ar"
    }))
    .unwrap();
    let tv = SubtitleRequest::episode("37854", 1, 4).with_language("ar");

    assert_eq!(anime.kind, MediaKind::Tv);
    assert_eq!(
        anime.cache_key("ckb").unwrap().job_id(),
        tv.cache_key("ckb").unwrap().job_id()
    );
}

/// Test that a request without a language falls back to the default
#[test]
fn test_cacheKey_withoutLanguage_shouldUseDefault() {
    let key = SubtitleRequest::movie("550").cache_key("ckb").unwrap();

    assert_eq!(key.language, "ckb");
    assert_eq!(key.language_name(), "Kurdish (Sorani)");
    assert_eq!(key.to_string(), "movie-550-0-0-ckb");
}

/// Test that an empty language string also falls back to the default
#[test]
fn test_cacheKey_withBlankLanguage_shouldUseDefault() {
    let key = SubtitleRequest::movie("550").with_language("  ").cache_key("fr").unwrap();
    assert_eq!(key.language, "fr");
}

/// Test that season or episode zero is treated as missing for tv
#[test]
fn test_cacheKey_withZeroSeasonOrEpisode_shouldBeRejected() {
    assert_eq!(
        SubtitleRequest::episode("1399", 0, 3).cache_key("ckb"),
        Err(PipelineError::MissingIdentifier("season".to_string()))
    );
    assert_eq!(
        SubtitleRequest::episode("1399", 2, 0).cache_key("ckb"),
        Err(PipelineError::MissingIdentifier("episode".to_string()))
    );
    assert!(SubtitleRequest::episode("1399", 1, 1).cache_key("ckb").is_ok());
}

/// Test that language codes are matched exactly
#[test]
fn test_cacheKey_withWrongCaseLanguage_shouldBeRejected() {
    let result = SubtitleRequest::movie("550").with_language("ZH-tw").cache_key("ckb");

    assert_eq!(
        result,
        Err(PipelineError::UnsupportedLanguage {
            code: "ZH-tw".to_string()
        })
    );
}

/// Test the serialized form of submit outcomes
#[test]
fn test_submitOutcome_serialize_shouldTagStatus() {
    let hit = SubmitOutcome::CacheHit {
        artifact: ArtifactRef::new("movies/550/fr/subtitle.vtt", None),
    };
    let started = SubmitOutcome::Started {
        job_id: "movie-550-0-0-fr".to_string(),
    };

    assert_eq!(
        serde_json::to_value(&hit).unwrap(),
        json!({ "status": "cache_hit", "artifact": { "relative_path": "movies/550/fr/subtitle.vtt" } })
    );
    assert_eq!(
        serde_json::to_value(&started).unwrap(),
        json!({ "status": "started", "job_id": "movie-550-0-0-fr" })
    );
    assert_eq!(hit.job_id(), None);
    assert_eq!(started.job_id(), Some("movie-550-0-0-fr"));
}

/// Test that a fresh job status omits fields that are not known yet
#[test]
fn test_jobStatus_serialize_shouldSkipUnknownFields() {
    let tracker = JobTracker::new(Duration::from_secs(60));
    let request = SubtitleRequest::movie("550").with_language("fr");
    let key = request.cache_key("ckb").unwrap();
    assert!(matches!(tracker.register(&key), Registration::Started(_)));

    let status = tracker.status(&key.job_id()).unwrap();
    let value = serde_json::to_value(&status).unwrap();

    assert_eq!(value["state"], "starting");
    assert_eq!(value["progress"], 0);
    assert_eq!(value["message"], "Initializing subtitle fetch for French...");
    assert!(value.get("source").is_none());
    assert!(value.get("artifact").is_none());
    assert!(value.get("sources_tried").is_none());
}
