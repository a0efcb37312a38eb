// Shared helpers for integration tests
#![allow(dead_code)]

pub mod tracing;

use async_trait::async_trait;
use lineview::primitives::highlight_cache::{HighlightService, Theme};
use lineview::services::loader::{ContentSource, LoadRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// `count` lines reading "line 0", "line 1", ...
pub fn numbered_lines(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("line {i}")).collect()
}

/// A whole file kept in memory, served to the engine in chunks
pub struct FileSource {
    lines: Vec<String>,
    chunk: usize,
    /// Number of load calls in either direction
    pub calls: Arc<AtomicUsize>,
    /// Reject every request while set
    pub failing: bool,
}

impl FileSource {
    pub fn new(lines: Vec<String>, chunk: usize) -> Self {
        Self {
            lines,
            chunk,
            calls: Arc::new(AtomicUsize::new(0)),
            failing: false,
        }
    }

    /// Lines `start..start + count` with their 1-based line number and byte offset
    pub fn window(&self, start: usize, count: usize) -> (Vec<String>, usize, u64) {
        let end = (start + count).min(self.lines.len());
        let offset = self.lines[..start]
            .iter()
            .map(|l| l.len() as u64 + 1)
            .sum();
        (self.lines[start..end].to_vec(), start + 1, offset)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for FileSource {
    async fn load_before(&mut self, request: LoadRequest) -> anyhow::Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            anyhow::bail!("source unavailable");
        }
        let end = request.first_line_number.saturating_sub(1);
        let start = end.saturating_sub(self.chunk);
        Ok(self.lines[start..end].to_vec())
    }

    async fn load_after(&mut self, request: LoadRequest) -> anyhow::Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            anyhow::bail!("source unavailable");
        }
        let start = request.last_line_number.min(self.lines.len());
        let end = (start + self.chunk).min(self.lines.len());
        Ok(self.lines[start..end].to_vec())
    }
}

/// Highlighter that tags each line with the language and theme it was asked for
#[derive(Default)]
pub struct TaggingHighlighter {
    pub calls: AtomicUsize,
}

#[async_trait]
impl HighlightService for TaggingHighlighter {
    async fn highlight_line(
        &self,
        text: &str,
        language: &str,
        theme: Theme,
    ) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("<span data-lang=\"{language}\" data-theme=\"{theme}\">{text}</span>"))
    }
}
