/*!
 * Database record types.
 */

use serde::{Deserialize, Serialize};

use crate::request::{CacheKey, MediaKind};

/// One persisted artifact as recorded in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Store-relative path of the WebVTT file
    pub relative_path: String,
    /// Job id of the key that produced it
    pub job_key: String,
    pub kind: MediaKind,
    pub catalog_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub language: String,
    /// Subtitle provider that supplied the source text
    pub source: String,
    /// Hex SHA-256 of the artifact content
    pub content_sha256: String,
    pub byte_len: i64,
    /// RFC 3339 creation time
    pub created_at: String,
}

impl ArtifactRecord {
    /// Build a record for freshly persisted content
    pub fn new(key: &CacheKey, source: &str, content_sha256: String, byte_len: usize) -> Self {
        Self {
            relative_path: key.relative_path(),
            job_key: key.job_id(),
            kind: key.kind,
            catalog_id: key.catalog_id.clone(),
            season: key.season,
            episode: key.episode,
            language: key.language.clone(),
            source: source.to_string(),
            content_sha256,
            byte_len: byte_len as i64,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
