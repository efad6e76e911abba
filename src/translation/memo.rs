/*!
 * Translation memo.
 *
 * Remembers backend translations for the lifetime of the process so that the
 * same line is never sent to the backend twice for a language pair. The memo
 * is bounded by entry count (least recently used entries go first) and drops
 * entries that have not been read or written for the idle period.
 */

use log::debug;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::TranslationConfig;

/// Memo key combining source text, source language, and target language
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoKey {
    source_language: String,
    target_language: String,
    source_text: String,
}

impl MemoKey {
    fn new(source_language: &str, target_language: &str, source_text: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            source_text: source_text.to_string(),
        }
    }
}

/// Bounded translation memo shared by all jobs
#[derive(Clone)]
pub struct TranslationMemo {
    entries: Cache<MemoKey, String>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl TranslationMemo {
    /// Create a memo holding at most `capacity` entries, each expiring after
    /// `idle` without access
    pub fn new(capacity: u64, idle: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(idle)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            entries,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(
            config.memo_capacity,
            Duration::from_secs(config.memo_idle_secs),
        )
    }

    /// Look up a previous translation
    pub fn lookup(&self, source_language: &str, target_language: &str, text: &str) -> Option<String> {
        let key = MemoKey::new(source_language, target_language, text);

        match self.entries.get(&key) {
            Some(translation) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Memo hit for '{}' ({} -> {})",
                    truncate_text(text, 30),
                    source_language,
                    target_language
                );
                Some(translation)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Remember a successful translation
    pub fn store(&self, source_language: &str, target_language: &str, text: &str, translated: &str) {
        let key = MemoKey::new(source_language, target_language, text);
        self.entries.insert(key, translated.to_string());
    }

    /// Hit count, miss count and hit rate
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        (hits, misses, hit_rate)
    }

    /// Number of entries after pending evictions have been applied
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured maximum entry count
    pub fn capacity(&self) -> Option<u64> {
        self.entries.policy().max_capacity()
    }
}

impl std::fmt::Debug for TranslationMemo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (hits, misses, _) = self.stats();
        f.debug_struct("TranslationMemo")
            .field("entries", &self.entries.entry_count())
            .field("hits", &hits)
            .field("misses", &misses)
            .finish()
    }
}

/// Truncate text to a maximum number of characters with ellipsis
fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
