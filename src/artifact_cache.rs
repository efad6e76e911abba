/*!
 * Durable cache of finished subtitle artifacts.
 *
 * Artifacts are addressed by `CacheKey` and laid out hierarchically:
 * - `movies/<id>/<lang>/subtitle.vtt`
 * - `tvshows/<id>/season<S>/episode<E>/<lang>/subtitle.vtt`
 *
 * The presence of an artifact in the store is the proof that the work is
 * done. Artifacts are written once and never replaced. An optional manifest
 * records metadata about each artifact but is never consulted for lookups.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::database::{ArtifactRecord, Repository};
use crate::errors::PipelineError;
use crate::file_utils::FileManager;
use crate::request::CacheKey;

/// File name every artifact is stored under
pub const ARTIFACT_FILE_NAME: &str = "subtitle.vtt";

/// Reference to a persisted artifact handed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Path relative to the store root
    pub relative_path: String,
    /// Public URL, when a base URL is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl ArtifactRef {
    pub fn new(relative_path: impl Into<String>, public_url: Option<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            public_url,
        }
    }
}

/// Storage backend addressed by store-relative paths
#[async_trait]
pub trait DurableStore: Send + Sync + Debug {
    async fn exists(&self, relative_path: &str) -> Result<bool>;

    async fn get(&self, relative_path: &str) -> Result<Option<String>>;

    /// Store content unless something is already stored at the path.
    /// Returns whether this call wrote it.
    async fn put_new(&self, relative_path: &str, content: &str) -> Result<bool>;

    /// Relative paths of every stored artifact
    async fn list(&self) -> Result<Vec<String>>;
}

/// Filesystem store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a relative path
    pub fn resolve(&self, relative_path: &str) -> PathBuf {
        relative_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn exists(&self, relative_path: &str) -> Result<bool> {
        let path = self.resolve(relative_path);
        tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to check artifact: {:?}", path))
    }

    async fn get(&self, relative_path: &str) -> Result<Option<String>> {
        let path = self.resolve(relative_path);
        tokio::task::spawn_blocking(move || FileManager::read_optional(&path))
            .await
            .context("Store read task panicked")?
    }

    async fn put_new(&self, relative_path: &str, content: &str) -> Result<bool> {
        let path = self.resolve(relative_path);
        let content = content.to_string();

        tokio::task::spawn_blocking(move || FileManager::write_new(&path, &content))
            .await
            .context("Store write task panicked")?
    }

    async fn list(&self) -> Result<Vec<String>> {
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || {
            let files = FileManager::find_files_named(&root, ARTIFACT_FILE_NAME)?;
            let relative = files
                .iter()
                .filter_map(|path| path.strip_prefix(&root).ok())
                .map(|path| {
                    path.components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/")
                })
                .collect();
            Ok(relative)
        })
        .await
        .context("Store listing task panicked")?
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn exists(&self, relative_path: &str) -> Result<bool> {
        Ok(self.entries.read().contains_key(relative_path))
    }

    async fn get(&self, relative_path: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(relative_path).cloned())
    }

    async fn put_new(&self, relative_path: &str, content: &str) -> Result<bool> {
        let mut entries = self.entries.write();
        if entries.contains_key(relative_path) {
            return Ok(false);
        }
        entries.insert(relative_path.to_string(), content.to_string());
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self.entries.read().keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}

/// Write-once artifact cache over a `DurableStore`
#[derive(Clone)]
pub struct ArtifactCache {
    store: Arc<dyn DurableStore>,
    manifest: Option<Repository>,
    public_base_url: Option<String>,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self {
            store,
            manifest: None,
            public_base_url: None,
        }
    }

    /// Record metadata for every persisted artifact
    pub fn with_manifest(mut self, manifest: Repository) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Base URL artifacts are publicly served under
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.public_base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn manifest(&self) -> Option<&Repository> {
        self.manifest.as_ref()
    }

    /// Reference for a key, whether or not it has been persisted
    pub fn artifact_ref(&self, key: &CacheKey) -> ArtifactRef {
        let relative_path = key.relative_path();
        let public_url = self
            .public_base_url
            .as_ref()
            .map(|base| format!("{}/{}", base, relative_path));
        ArtifactRef::new(relative_path, public_url)
    }

    /// Authoritative check for a finished artifact
    pub async fn lookup(&self, key: &CacheKey) -> Result<Option<ArtifactRef>, PipelineError> {
        let relative_path = key.relative_path();
        let exists = self
            .store
            .exists(&relative_path)
            .await
            .map_err(|e| PipelineError::Storage(format!("{:#}", e)))?;

        if exists {
            debug!("Artifact cache hit: {}", relative_path);
            Ok(Some(self.artifact_ref(key)))
        } else {
            Ok(None)
        }
    }

    /// Read a persisted artifact
    pub async fn read(&self, key: &CacheKey) -> Result<Option<String>> {
        self.store.get(&key.relative_path()).await
    }

    /// Persist an artifact. If one already exists for the key it is kept and
    /// returned; the new content is discarded.
    pub async fn persist(&self, key: &CacheKey, content: &str, source: &str) -> Result<ArtifactRef> {
        let relative_path = key.relative_path();
        let written = self
            .store
            .put_new(&relative_path, content)
            .await
            .with_context(|| format!("Failed to persist artifact {}", relative_path))?;

        if written {
            info!("Saved subtitle to {}", relative_path);
            self.record(key, content, source).await;
        } else {
            warn!("Artifact {} already exists, keeping the existing file", relative_path);
        }

        Ok(self.artifact_ref(key))
    }

    /// Relative paths of all stored artifacts
    pub async fn list(&self) -> Result<Vec<String>> {
        self.store.list().await
    }

    async fn record(&self, key: &CacheKey, content: &str, source: &str) {
        let Some(manifest) = &self.manifest else {
            return;
        };

        let record = ArtifactRecord::new(key, source, Repository::hash_content(content), content.len());
        if let Err(e) = manifest.record_artifact(&record).await {
            warn!("Failed to record {} in manifest: {:#}", record.relative_path, e);
        }
    }
}

impl Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("store", &self.store)
            .field("manifest", &self.manifest.is_some())
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}
