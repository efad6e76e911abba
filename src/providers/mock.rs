/*!
 * Mock collaborator implementations for testing.
 *
 * Every mock counts its requests so tests can assert how often the pipeline
 * reached out:
 * - `MockBackend`: translation backend (`working`, `failing`, `intermittent`, `slow`)
 * - `MockSubtitleProvider`: subtitle search (`with_results`, `empty`, `failing`)
 * - `MockFetcher`: subtitle download
 * - `MockExternalIds`: external id lookup
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{
    ExternalIdService, SearchCriteria, SubtitleDescriptor, SubtitleFetcher, SubtitleProvider,
    TranslationBackend,
};
use crate::request::MediaKind;

/// Behavior mode for the mock translation backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with `[<target>] <text>`
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Succeeds after a delay
    Slow { delay_ms: u64 },
}

/// Mock translation backend
#[derive(Debug, Clone)]
pub struct MockBackend {
    behavior: MockBehavior,
    /// Texts that always fail regardless of behavior
    failing_texts: Arc<HashSet<String>>,
    request_count: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            failing_texts: Arc::new(HashSet::new()),
            request_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Make the given texts fail on every request
    pub fn with_failures_for(mut self, texts: &[&str]) -> Self {
        self.failing_texts = Arc::new(texts.iter().map(|t| t.to_string()).collect());
        self
    }

    /// The translation `Working` produces for a text
    pub fn expected_translation(text: &str, target_language: &str) -> String {
        format!("[{}] {}", target_language, text)
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous requests observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Texts in the order they were requested
    pub fn requested_texts(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate(
        &self,
        text: &str,
        _source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(text.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay_ms = match self.behavior {
            MockBehavior::Slow { delay_ms } => delay_ms,
            // Yield long enough for concurrent requests to overlap
            _ => 2,
        };
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_texts.contains(text) {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: format!("Simulated failure for '{}'", text),
            });
        }

        match self.behavior {
            MockBehavior::Working | MockBehavior::Slow { .. } => {
                Ok(Self::expected_translation(text, target_language))
            }
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        status_code: 503,
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                    })
                } else {
                    Ok(Self::expected_translation(text, target_language))
                }
            }
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "Simulated backend failure".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
enum SearchBehavior {
    Results(Vec<SubtitleDescriptor>),
    Empty,
    Failing,
}

/// Mock subtitle search service
#[derive(Debug, Clone)]
pub struct MockSubtitleProvider {
    name: String,
    behavior: SearchBehavior,
    /// Number of initial requests that fail before `behavior` applies
    fail_first: usize,
    request_count: Arc<AtomicUsize>,
    criteria: Arc<Mutex<Vec<SearchCriteria>>>,
}

impl MockSubtitleProvider {
    fn new(name: &str, behavior: SearchBehavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            fail_first: 0,
            request_count: Arc::new(AtomicUsize::new(0)),
            criteria: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_results(name: &str, results: Vec<SubtitleDescriptor>) -> Self {
        Self::new(name, SearchBehavior::Results(results))
    }

    pub fn empty(name: &str) -> Self {
        Self::new(name, SearchBehavior::Empty)
    }

    pub fn failing(name: &str) -> Self {
        Self::new(name, SearchBehavior::Failing)
    }

    /// Fail the first `count` requests before behaving normally
    pub fn fail_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }

    /// Convenience descriptor
    pub fn descriptor(language: &str, url: &str) -> SubtitleDescriptor {
        SubtitleDescriptor {
            language: Some(language.to_string()),
            url: url.to_string(),
            filename: None,
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Criteria received, in order
    pub fn received_criteria(&self) -> Vec<SearchCriteria> {
        self.criteria.lock().clone()
    }
}

#[async_trait]
impl SubtitleProvider for MockSubtitleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<SubtitleDescriptor>, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.criteria.lock().push(criteria.clone());

        if count < self.fail_first {
            return Err(ProviderError::ConnectionError(format!(
                "Simulated {} outage (request #{})",
                self.name,
                count + 1
            )));
        }

        match &self.behavior {
            SearchBehavior::Results(results) => Ok(results.clone()),
            SearchBehavior::Empty => Ok(Vec::new()),
            SearchBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 502,
                message: format!("Simulated {} failure", self.name),
            }),
        }
    }
}

/// Mock subtitle downloader serving fixed bodies by URL
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    bodies: Arc<HashMap<String, String>>,
    fail_first: usize,
    request_count: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        let mut bodies = (*self.bodies).clone();
        bodies.insert(url.to_string(), body.to_string());
        self.bodies = Arc::new(bodies);
        self
    }

    /// Fail the first `count` downloads
    pub fn fail_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubtitleFetcher for MockFetcher {
    async fn download(&self, url: &str) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        if count < self.fail_first {
            return Err(ProviderError::ApiError {
                status_code: 503,
                message: "Simulated download failure".to_string(),
            });
        }

        self.bodies.get(url).cloned().ok_or_else(|| ProviderError::ApiError {
            status_code: 404,
            message: format!("No body for {}", url),
        })
    }
}

/// Mock external id lookup
#[derive(Debug, Clone)]
pub struct MockExternalIds {
    result: Option<Result<String, ()>>,
    request_count: Arc<AtomicUsize>,
}

impl MockExternalIds {
    pub fn returning(external_id: &str) -> Self {
        Self {
            result: Some(Ok(external_id.to_string())),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn missing() -> Self {
        Self {
            result: None,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Some(Err(())),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalIdService for MockExternalIds {
    async fn lookup(&self, _catalog_id: &str, _kind: MediaKind) -> Result<Option<String>, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        match &self.result {
            Some(Ok(id)) => Ok(Some(id.clone())),
            Some(Err(())) => Err(ProviderError::ConnectionError("Simulated lookup failure".to_string())),
            None => Ok(None),
        }
    }
}
