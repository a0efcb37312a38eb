//! Per-line syntax highlight cache
//!
//! # Design
//! - **Viewport-only**: only lines the host is about to paint are ever sent to
//!   the highlighting service, one batch per paint cycle.
//! - **Wholesale invalidation**: a change of line count, language or theme
//!   clears the whole cache. Nothing is patched in place, so markup computed
//!   for an old theme can never be shown under a new one.
//! - **Generations**: every invalidation bumps a generation counter. A batch
//!   remembers the generation it was planned in, and its results are dropped
//!   if the cache was invalidated while the service was working.
//! - **Graceful failure**: a line the service fails on stays plain text and is
//!   not requested again until the next invalidation.

use crate::config::HighlightConfig;
use async_trait::async_trait;
use lru::LruCache;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Environment variable consulted once to seed the global highlighting flag
pub const HIGHLIGHTING_ENV_VAR: &str = "LINEVIEW_SYNTAX_HIGHLIGHTING";

/// Process-wide "syntax highlighting enabled" flag, seeded on first use
static HIGHLIGHTING_ENABLED: Lazy<AtomicBool> = Lazy::new(|| {
    let enabled = match std::env::var(HIGHLIGHTING_ENV_VAR) {
        Ok(value) => !matches!(value.trim(), "0" | "false" | "off" | "no"),
        Err(_) => true,
    };
    AtomicBool::new(enabled)
});

/// Whether syntax highlighting is enabled for this process
pub fn syntax_highlighting_enabled() -> bool {
    HIGHLIGHTING_ENABLED.load(Ordering::Relaxed)
}

/// Enable or disable syntax highlighting for every engine in this process
pub fn set_syntax_highlighting_enabled(enabled: bool) {
    HIGHLIGHTING_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Color scheme the markup is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// Host-supplied highlighter producing markup for single lines
#[async_trait]
pub trait HighlightService: Send + Sync {
    /// Markup for one line of `language` text under `theme`
    async fn highlight_line(&self, text: &str, language: &str, theme: Theme)
        -> anyhow::Result<String>;

    /// Markup for a batch of lines, one result per input line, in order
    async fn highlight_lines(
        &self,
        lines: &[Arc<str>],
        language: &str,
        theme: Theme,
    ) -> Vec<anyhow::Result<String>> {
        let mut results = Vec::with_capacity(lines.len());
        for line in lines {
            results.push(self.highlight_line(line, language, theme).await);
        }
        results
    }
}

/// Lines to highlight in one service call
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightBatch {
    /// Cache generation this batch was planned in
    pub generation: u64,
    pub language: String,
    pub theme: Theme,
    /// Buffer indices, parallel to `texts`
    pub indices: Vec<usize>,
    pub texts: Vec<Arc<str>>,
}

impl HighlightBatch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Ask `service` to highlight every line of `batch`
pub async fn highlight_batch(
    batch: &HighlightBatch,
    service: &dyn HighlightService,
) -> Vec<anyhow::Result<String>> {
    service
        .highlight_lines(&batch.texts, &batch.language, batch.theme)
        .await
}

/// Cache of rendered markup keyed by buffer line index
pub struct HighlightCoordinator {
    config: HighlightConfig,
    cache: LruCache<usize, Arc<str>>,
    /// Lines the service failed on in the current generation
    failed: HashSet<usize>,
    /// Lines sent in a batch that has not been applied yet
    pending: HashSet<usize>,
    language: Option<String>,
    theme: Theme,
    line_count: usize,
    generation: u64,
}

impl fmt::Debug for HighlightCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HighlightCoordinator")
            .field("cached", &self.cache.len())
            .field("failed", &self.failed.len())
            .field("pending", &self.pending.len())
            .field("language", &self.language)
            .field("theme", &self.theme)
            .field("line_count", &self.line_count)
            .field("generation", &self.generation)
            .finish()
    }
}

impl HighlightCoordinator {
    pub fn new(config: HighlightConfig, theme: Theme) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            cache: LruCache::new(capacity),
            failed: HashSet::new(),
            pending: HashSet::new(),
            language: None,
            theme,
            line_count: 0,
            generation: 0,
        }
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of cached lines
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop every cached line and start a new generation
    pub fn invalidate(&mut self, reason: &str) {
        tracing::debug!(
            "Highlight cache invalidated ({}): dropping {} lines",
            reason,
            self.cache.len()
        );
        self.cache.clear();
        self.failed.clear();
        self.pending.clear();
        self.generation += 1;
    }

    /// Set the detected language (`None` for plain text)
    pub fn set_language(&mut self, language: Option<&str>) {
        if self.language.as_deref() != language {
            self.language = language.map(str::to_string);
            self.invalidate("language changed");
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if self.theme != theme {
            self.theme = theme;
            self.invalidate("theme changed");
        }
    }

    /// Record the buffer's line count; any change means new content
    pub fn set_line_count(&mut self, line_count: usize) {
        if self.line_count != line_count {
            self.line_count = line_count;
            self.invalidate("line count changed");
        }
    }

    /// Cached markup for a line, marking it recently used
    pub fn get(&mut self, index: usize) -> Option<Arc<str>> {
        self.cache.get(&index).cloned()
    }

    /// Cached markup for a line without touching recency
    pub fn peek(&self, index: usize) -> Option<&Arc<str>> {
        self.cache.peek(&index)
    }

    pub fn is_cached(&self, index: usize) -> bool {
        self.cache.contains(&index)
    }

    pub fn is_failed(&self, index: usize) -> bool {
        self.failed.contains(&index)
    }

    /// Collect the rendered lines that still need markup
    ///
    /// `rendered` yields `(buffer index, text)` for the lines about to be
    /// painted. Returns `None` when highlighting is off, no language is known,
    /// or every line is already cached, skipped or in flight.
    pub fn plan_batch<I>(&mut self, rendered: I) -> Option<HighlightBatch>
    where
        I: IntoIterator<Item = (usize, Arc<str>)>,
    {
        if !self.config.enabled || !syntax_highlighting_enabled() {
            return None;
        }
        let language = self.language.clone()?;

        let mut indices = Vec::new();
        let mut texts = Vec::new();
        for (index, text) in rendered {
            if self.cache.contains(&index)
                || self.failed.contains(&index)
                || self.pending.contains(&index)
            {
                continue;
            }
            if text.chars().nth(self.config.max_line_chars).is_some() {
                continue;
            }
            self.pending.insert(index);
            indices.push(index);
            texts.push(text);
        }

        if indices.is_empty() {
            return None;
        }
        tracing::trace!(
            "Planned highlight batch of {} lines (generation {})",
            indices.len(),
            self.generation
        );
        Some(HighlightBatch {
            generation: self.generation,
            language,
            theme: self.theme,
            indices,
            texts,
        })
    }

    /// Merge service results for `batch`; returns how many lines were cached
    ///
    /// Results for a batch planned before the last invalidation are dropped.
    pub fn apply_batch(
        &mut self,
        batch: &HighlightBatch,
        results: Vec<anyhow::Result<String>>,
    ) -> usize {
        if batch.generation != self.generation {
            tracing::debug!(
                "Dropping stale highlight batch (generation {} != {})",
                batch.generation,
                self.generation
            );
            return 0;
        }

        let mut applied = 0;
        let mut results = results.into_iter();
        for &index in &batch.indices {
            self.pending.remove(&index);
            match results.next() {
                Some(Ok(markup)) => {
                    self.cache.put(index, Arc::from(markup));
                    applied += 1;
                }
                Some(Err(e)) => {
                    tracing::debug!("Highlighting line {} failed: {:#}", index, e);
                    self.failed.insert(index);
                }
                None => {
                    self.failed.insert(index);
                }
            }
        }
        applied
    }

    /// Highlight `batch` with `service` and merge the results
    pub async fn run_batch(&mut self, batch: HighlightBatch, service: &dyn HighlightService) -> usize {
        let results = highlight_batch(&batch, service).await;
        self.apply_batch(&batch, results)
    }
}
