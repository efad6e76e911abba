/*!
 * Repository layer for the artifact manifest.
 *
 * Provides typed access to the `artifacts` table. The manifest only
 * describes artifacts; whether an artifact exists is decided by the store.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};

use super::connection::DatabaseConnection;
use super::models::ArtifactRecord;

/// Repository for manifest operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

const ARTIFACT_COLUMNS: &str = "relative_path, job_key, kind, catalog_id, season, episode, \
     language, source, content_sha256, byte_len, created_at";

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Record an artifact. Returns `false` if the path was already recorded,
    /// in which case the existing row is left untouched.
    pub async fn record_artifact(&self, record: &ArtifactRecord) -> Result<bool> {
        let record = record.clone();

        self.db
            .execute_async(move |conn| {
                let inserted = conn.execute(
                    &format!(
                        "INSERT OR IGNORE INTO artifacts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        ARTIFACT_COLUMNS
                    ),
                    params![
                        record.relative_path,
                        record.job_key,
                        record.kind.as_str(),
                        record.catalog_id,
                        record.season,
                        record.episode,
                        record.language,
                        record.source,
                        record.content_sha256,
                        record.byte_len,
                        record.created_at,
                    ],
                )?;

                debug!("Manifest record for {}: inserted={}", record.relative_path, inserted > 0);
                Ok(inserted > 0)
            })
            .await
    }

    /// Get an artifact record by relative path
    pub async fn get_artifact(&self, relative_path: &str) -> Result<Option<ArtifactRecord>> {
        let relative_path = relative_path.to_string();

        self.db
            .execute_async(move |conn| {
                let record = conn
                    .query_row(
                        &format!("SELECT {} FROM artifacts WHERE relative_path = ?1", ARTIFACT_COLUMNS),
                        [relative_path],
                        Self::map_artifact,
                    )
                    .optional()?;
                Ok(record)
            })
            .await
    }

    /// List all artifact records, newest first
    pub async fn list_artifacts(&self) -> Result<Vec<ArtifactRecord>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM artifacts ORDER BY created_at DESC, relative_path",
                    ARTIFACT_COLUMNS
                ))?;

                let records = stmt
                    .query_map([], Self::map_artifact)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
    }

    /// List artifact records for one target language
    pub async fn list_artifacts_for_language(&self, language: &str) -> Result<Vec<ArtifactRecord>> {
        let language = language.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM artifacts WHERE language = ?1 ORDER BY created_at DESC, relative_path",
                    ARTIFACT_COLUMNS
                ))?;

                let records = stmt
                    .query_map([language], Self::map_artifact)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
    }

    fn map_artifact(row: &Row<'_>) -> rusqlite::Result<ArtifactRecord> {
        let kind: String = row.get(2)?;
        Ok(ArtifactRecord {
            relative_path: row.get(0)?,
            job_key: row.get(1)?,
            kind: kind.parse().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
            })?,
            catalog_id: row.get(3)?,
            season: row.get(4)?,
            episode: row.get(5)?,
            language: row.get(6)?,
            source: row.get(7)?,
            content_sha256: row.get(8)?,
            byte_len: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    /// Compute the hex SHA-256 of artifact content
    pub fn hash_content(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
