//! Bounded literal search over the visible line sequence
//!
//! # Design
//! - **Bounded output**: at most `max_results` matches are kept. Hitting the cap
//!   is reported through `is_limited`, never by silently dropping matches.
//! - **Bounded cost**: each line is truncated to `max_line_chars` before the
//!   regex sees it, so one pathological line cannot stall the scan.
//! - **Coarse re-run**: the same term is searched again only when the visible
//!   sequence grew or shrank by more than `rerun_line_delta` lines.

use crate::config::SearchConfig;
use crate::model::line_buffer::LineBuffer;
use crate::view::projection::VisibleSequence;
use regex::{Regex, RegexBuilder};

/// One match, in display coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// 1-based display line number
    pub line: usize,
    /// 1-based character column of the match start
    pub column: usize,
    pub matched_text: String,
    /// Trimmed, truncated text of the whole line
    pub context: String,
    /// Buffer index of the line
    pub original_index: usize,
}

/// Result set of one search run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    /// More matches existed than were kept
    pub is_limited: bool,
}

/// Search state for one view
#[derive(Debug, Clone)]
pub struct SearchEngine {
    config: SearchConfig,
    term: String,
    /// Visible length the current results were computed against
    searched_len: Option<usize>,
    outcome: SearchOutcome,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            term: String::new(),
            searched_len: None,
            outcome: SearchOutcome::default(),
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.outcome.results
    }

    pub fn is_limited(&self) -> bool {
        self.outcome.is_limited
    }

    pub fn outcome(&self) -> &SearchOutcome {
        &self.outcome
    }

    /// Whether `term` over a sequence of `visible_len` lines needs a new run
    pub fn needs_rerun(&self, term: &str, visible_len: usize) -> bool {
        if term != self.term {
            return true;
        }
        match self.searched_len {
            None => !term.is_empty(),
            Some(len) => len.abs_diff(visible_len) > self.config.rerun_line_delta,
        }
    }

    /// Search if the term or the visible length changed enough
    ///
    /// Returns `true` when results were recomputed.
    pub fn update(&mut self, term: &str, visible: &VisibleSequence, buffer: &LineBuffer) -> bool {
        if !self.needs_rerun(term, visible.len()) {
            return false;
        }
        self.run(term, visible, buffer);
        true
    }

    /// Search unconditionally
    pub fn run(&mut self, term: &str, visible: &VisibleSequence, buffer: &LineBuffer) {
        self.term = term.to_string();
        if term.is_empty() {
            self.searched_len = None;
            self.outcome = SearchOutcome::default();
            return;
        }

        self.searched_len = Some(visible.len());
        self.outcome = match build_matcher(term) {
            Ok(regex) => self.scan(&regex, visible, buffer),
            Err(e) => {
                tracing::warn!("Search pattern for {:?} failed to compile: {}", term, e);
                SearchOutcome::default()
            }
        };
        tracing::debug!(
            "Search for {:?}: {} results over {} visible lines (limited: {})",
            term,
            self.outcome.results.len(),
            visible.len(),
            self.outcome.is_limited
        );
    }

    fn scan(&self, regex: &Regex, visible: &VisibleSequence, buffer: &LineBuffer) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        for (text, original) in visible.lines(buffer) {
            let scanned = truncate_chars(text, self.config.max_line_chars);
            for found in regex.find_iter(scanned) {
                if outcome.results.len() >= self.config.max_results {
                    outcome.is_limited = true;
                    return outcome;
                }
                outcome.results.push(SearchResult {
                    line: buffer.line_number_of(original),
                    column: scanned[..found.start()].chars().count() + 1,
                    matched_text: found.as_str().to_string(),
                    context: truncate_chars(text.trim(), self.config.context_chars).to_string(),
                    original_index: original,
                });
            }
        }
        outcome
    }

    /// Move kept results' buffer indices down after `lines` were prepended
    ///
    /// Display line numbers are unaffected.
    pub fn shift_indices(&mut self, lines: usize) {
        for result in &mut self.outcome.results {
            result.original_index += lines;
        }
    }

    /// Forget the term and results
    pub fn clear(&mut self) {
        self.term.clear();
        self.searched_len = None;
        self.outcome = SearchOutcome::default();
    }

    /// Display line of the result at `active`
    pub fn line_of(&self, active: usize) -> Option<usize> {
        self.outcome.results.get(active).map(|r| r.line)
    }

    /// Index after `active`, wrapping to the first result
    pub fn next_index(&self, active: Option<usize>) -> Option<usize> {
        let len = self.outcome.results.len();
        if len == 0 {
            return None;
        }
        Some(match active {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        })
    }

    /// Index before `active`, wrapping to the last result
    pub fn previous_index(&self, active: Option<usize>) -> Option<usize> {
        let len = self.outcome.results.len();
        if len == 0 {
            return None;
        }
        Some(match active {
            Some(i) if i > 0 && i <= len => i - 1,
            _ => len - 1,
        })
    }
}

/// Case-insensitive matcher for a literal term
fn build_matcher(term: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
}

/// Prefix of `text` holding at most `max` characters
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
