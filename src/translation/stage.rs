/*!
 * Subtitle translation stage.
 *
 * Translates the dialogue lines of a subtitle file while leaving its
 * structure alone. Each distinct line is translated once: memo hits are used
 * directly, misses go to the backend through the throttle. A line whose
 * translation fails keeps its original text.
 */

use anyhow::anyhow;
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::jobs::JobState;
use crate::providers::TranslationBackend;
use crate::subtitle_format::{is_translatable_line, normalize_source};
use crate::translation::{TranslationMemo, TranslationThrottle};

/// Receives (state, progress, message) as the stage advances
pub type ProgressFn<'a> = dyn Fn(JobState, u8, String) + Send + Sync + 'a;

/// Result of translating one subtitle file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedSubtitle {
    /// Subtitle text with dialogue replaced
    pub content: String,
    /// Number of dialogue lines
    pub total_lines: usize,
    /// Number of distinct dialogue lines
    pub unique_lines: usize,
    /// Distinct lines answered from the memo
    pub memo_hits: usize,
    /// Distinct lines left untranslated because the backend failed
    pub failed_lines: usize,
}

/// Shared translation machinery for all jobs
#[derive(Clone)]
pub struct TranslationStage {
    backend: Arc<dyn TranslationBackend>,
    throttle: TranslationThrottle,
    memo: TranslationMemo,
    source_language: String,
}

impl TranslationStage {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        throttle: TranslationThrottle,
        memo: TranslationMemo,
        source_language: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            throttle,
            memo,
            source_language: source_language.into(),
        }
    }

    pub fn memo(&self) -> &TranslationMemo {
        &self.memo
    }

    pub fn throttle(&self) -> &TranslationThrottle {
        &self.throttle
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    /// Translate `content` into `target_language`.
    ///
    /// Progress: 40 once lines are counted, 50 once they are deduplicated,
    /// `50 + done * 40 / unique` as each distinct line settles, and 95
    /// (`finalizing`) when the text has been rebuilt.
    pub async fn translate(
        &self,
        content: &str,
        target_language: &str,
        language_name: &str,
        progress: &ProgressFn<'_>,
    ) -> TranslatedSubtitle {
        let content = normalize_source(content);
        let lines: Vec<&str> = content.split('\n').collect();

        let translatable: Vec<&str> = lines.iter().copied().filter(|l| is_translatable_line(l)).collect();
        progress(
            JobState::Translating,
            40,
            format!("Translating {} subtitle lines to {}...", translatable.len(), language_name),
        );

        let mut seen = HashSet::new();
        let unique: Vec<&str> = translatable.iter().copied().filter(|l| seen.insert(*l)).collect();
        info!("Reduced to {} unique lines for translation", unique.len());
        progress(
            JobState::Translating,
            50,
            format!("Processing {} unique lines in {}...", unique.len(), language_name),
        );

        let total = unique.len();
        let done = AtomicUsize::new(0);
        let memo_hits = AtomicUsize::new(0);

        let settled = futures::future::join_all(unique.iter().map(|line| {
            let line = line.to_string();
            let done = &done;
            let memo_hits = &memo_hits;
            async move {
                let translated = self.translate_line(&line, target_language, memo_hits).await;

                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                progress(
                    JobState::Translating,
                    (50 + finished * 40 / total) as u8,
                    format!("Translated {}/{} lines to {}...", finished, total, language_name),
                );

                (line, translated)
            }
        }))
        .await;

        let mut failed_lines = 0;
        let translations: HashMap<String, String> = settled
            .into_iter()
            .filter_map(|(line, translated)| match translated {
                Some(text) => Some((line, text)),
                None => {
                    failed_lines += 1;
                    None
                }
            })
            .collect();

        let rebuilt = lines
            .iter()
            .map(|&line| {
                if is_translatable_line(line) {
                    translations.get(line).map(String::as_str).unwrap_or(line)
                } else {
                    line
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        progress(
            JobState::Finalizing,
            95,
            format!("Finalizing {} translation...", language_name),
        );

        TranslatedSubtitle {
            content: rebuilt,
            total_lines: translatable.len(),
            unique_lines: total,
            memo_hits: memo_hits.load(Ordering::SeqCst),
            failed_lines,
        }
    }

    /// Translate a single distinct line; `None` when the backend failed
    async fn translate_line(&self, line: &str, target_language: &str, memo_hits: &AtomicUsize) -> Option<String> {
        if let Some(hit) = self.memo.lookup(&self.source_language, target_language, line) {
            memo_hits.fetch_add(1, Ordering::SeqCst);
            return Some(hit);
        }

        let backend = Arc::clone(&self.backend);
        let text = line.to_string();
        let source = self.source_language.clone();
        let target = target_language.to_string();

        let result = self
            .throttle
            .submit(move || async move {
                backend
                    .translate(&text, &source, &target)
                    .await
                    .map_err(|e| anyhow!(e))
            })
            .await;

        match result {
            Ok(translated) => {
                self.memo.store(&self.source_language, target_language, line, &translated);
                Some(translated)
            }
            Err(e) => {
                let preview: String = line.chars().take(50).collect();
                warn!("Translation failed for text: {}... ({:#})", preview, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for TranslationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationStage")
            .field("backend", &self.backend)
            .field("throttle", &self.throttle)
            .field("source_language", &self.source_language)
            .finish()
    }
}
