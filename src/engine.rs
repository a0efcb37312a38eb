//! The line engine: one open file in one view
//!
//! `LineEngine` owns every component and keeps them consistent:
//!
//! ```text
//! loader -> buffer -> folding -> projection -> viewport
//!                                   |             |
//!                                 search     highlight cache
//! ```
//!
//! The host calls methods on the engine and learns about asynchronous
//! changes through [`EngineEvent`] subscribers. All positions the host
//! passes in use display numbering (the file's own line numbers and byte
//! offsets), which may start anywhere when the window was loaded from the
//! middle of a file.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::folding::{FoldId, FoldingIndex, StructureKind};
use crate::model::line_buffer::LineBuffer;
use crate::primitives::highlight_cache::{
    highlight_batch, HighlightBatch, HighlightCoordinator, HighlightService, Theme,
};
use crate::primitives::language::Language;
use crate::primitives::search::{SearchEngine, SearchOutcome, SearchResult};
use crate::services::loader::{
    ContentSource, Direction, IncrementalLoader, LoadRequest, LoadTicket, ScrollAnchor,
    ScrollEvent,
};
use crate::view::projection::VisibleSequence;
use crate::view::viewport::{Align, LineHeight, Viewport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Change notifications delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Search results were recomputed
    SearchResults {
        results: Vec<SearchResult>,
        is_limited: bool,
    },
    /// Ranges were re-parsed or a range was collapsed/expanded
    FoldsChanged {
        ranges: usize,
        collapsed: usize,
        visible_lines: usize,
    },
    /// Lines were added at one end of the buffer
    BufferSpliced {
        direction: Direction,
        lines_added: usize,
        line_count: usize,
    },
    /// New markup is available for these buffer lines
    HighlightsUpdated { lines: Vec<usize> },
}

/// Handle returned by [`LineEngine::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&EngineEvent) + Send>;

/// Line and optional column the host last navigated to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusPosition {
    pub line_number: usize,
    pub column: Option<usize>,
}

/// Fold header information attached to a rendered line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldMarker {
    pub id: FoldId,
    pub collapsed: bool,
    pub summary: String,
}

/// Everything the host needs to paint one row
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLine {
    pub visible_index: usize,
    pub original_index: usize,
    /// 1-based display line number
    pub line_number: usize,
    pub text: Arc<str>,
    /// Highlighted markup, if cached
    pub markup: Option<Arc<str>>,
    /// Present when this line is a fold header
    pub fold: Option<FoldMarker>,
}

/// Virtualized view over one (possibly huge) file
pub struct LineEngine {
    config: EngineConfig,
    buffer: LineBuffer,
    loaded: bool,
    path: Option<PathBuf>,
    language: Option<Language>,
    folding: FoldingIndex,
    visible: VisibleSequence,
    viewport: Viewport,
    loader: IncrementalLoader,
    search: SearchEngine,
    highlights: HighlightCoordinator,
    focus: Option<FocusPosition>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl std::fmt::Debug for LineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineEngine")
            .field("path", &self.path)
            .field("language", &self.language)
            .field("lines", &self.buffer.len())
            .field("visible", &self.visible.len())
            .field("folds", &self.folding.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Default for LineEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl LineEngine {
    /// Create an engine with nothing loaded and a zero-height viewport
    pub fn new(config: EngineConfig) -> Self {
        let viewport = Viewport::new(
            0.0,
            config.viewport.line_height_px,
            config.viewport.overscan,
        );
        Self {
            buffer: LineBuffer::new(),
            loaded: false,
            path: None,
            language: None,
            folding: FoldingIndex::new(),
            visible: VisibleSequence::default(),
            viewport,
            loader: IncrementalLoader::new(config.loader.clone()),
            search: SearchEngine::new(config.search.clone()),
            highlights: HighlightCoordinator::new(config.highlight.clone(), Theme::default()),
            focus: None,
            subscribers: Vec::new(),
            next_subscription: 1,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Subscribers
    // ------------------------------------------------------------------

    /// Register a change listener
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&EngineEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    fn emit(&mut self, event: EngineEvent) {
        for (_, listener) in self.subscribers.iter_mut() {
            listener(&event);
        }
    }

    // ------------------------------------------------------------------
    // File lifecycle
    // ------------------------------------------------------------------

    /// Load a window of a file
    ///
    /// `path` is only a hint for language detection. `first_line_number` and
    /// `base_byte_offset` say where in the file the first line sits.
    pub fn load_file<I, S>(
        &mut self,
        path: Option<&Path>,
        lines: I,
        first_line_number: usize,
        base_byte_offset: u64,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.buffer.replace_all(lines);
        self.buffer.set_origin(first_line_number, base_byte_offset);
        self.loaded = true;
        self.path = path.map(Path::to_path_buf);
        self.language = {
            let sample: Vec<&str> = self.buffer.iter().collect();
            Language::detect(path, &sample)
        };

        tracing::debug!(
            "Loaded {} lines from {:?} at line {} / byte {} (language: {:?})",
            self.buffer.len(),
            self.path,
            self.buffer.first_line_number(),
            self.buffer.base_byte_offset(),
            self.language
        );

        self.folding.clear();
        self.reparse();
        self.viewport.clear_measurements();
        self.reproject();
        self.viewport.set_scroll_top(0.0);
        self.loader.reset();
        self.focus = None;
        self.highlights.set_language(self.language.map(|l| l.id()));
        self.highlights.set_line_count(self.buffer.len());
        // Same language and length says nothing about the content
        self.highlights.invalidate("file loaded");
        self.clear_search();
        self.emit_folds_changed();
    }

    /// Drop the loaded file and every derived structure
    pub fn close(&mut self) {
        tracing::debug!("Closing {:?}", self.path);
        self.buffer.clear();
        self.loaded = false;
        self.path = None;
        self.language = None;
        self.folding.clear();
        self.viewport.clear_measurements();
        self.reproject();
        self.viewport.set_scroll_top(0.0);
        self.loader.reset();
        self.clear_search();
        self.focus = None;
        self.highlights.set_language(None);
        self.highlights.set_line_count(0);
        self.highlights.invalidate("file closed");
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn language(&self) -> Option<Language> {
        self.language
    }

    /// Override the detected language (`None` for plain text)
    pub fn set_language(&mut self, language: Option<Language>) {
        if self.language == language {
            return;
        }
        self.language = language;
        self.highlights.set_language(language.map(|l| l.id()));
        self.refold();
    }

    pub fn theme(&self) -> Theme {
        self.highlights.theme()
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.highlights.set_theme(theme);
    }

    fn structure_kind(&self) -> StructureKind {
        self.language
            .map(|l| l.structure_kind())
            .unwrap_or_default()
    }

    fn reparse(&mut self) {
        let kind = self.structure_kind();
        self.folding.rebuild(&self.buffer, kind, &self.config.folding);
    }

    fn reproject(&mut self) {
        self.visible = VisibleSequence::project(self.buffer.len(), &self.folding);
        self.viewport.set_item_count(self.visible.len());
    }

    /// Re-parse ranges and re-project, keeping the top line on screen
    fn refold(&mut self) {
        let anchor = self.capture_anchor();
        self.reparse();
        self.viewport.clear_measurements();
        self.reproject();
        self.restore_anchor(anchor);
        self.rerun_search();
        self.emit_folds_changed();
    }

    fn emit_folds_changed(&mut self) {
        let event = EngineEvent::FoldsChanged {
            ranges: self.folding.len(),
            collapsed: self.folding.collapsed_ranges().count(),
            visible_lines: self.visible.len(),
        };
        self.emit(event);
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }

    pub fn folding(&self) -> &FoldingIndex {
        &self.folding
    }

    pub fn visible(&self) -> &VisibleSequence {
        &self.visible
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn focus(&self) -> Option<FocusPosition> {
        self.focus
    }

    /// Visible indices the host must paint (inclusive, with overscan)
    pub fn rendered_range(&self) -> Option<(usize, usize)> {
        self.viewport.rendered_range()
    }

    pub fn total_rendered_height(&self) -> f64 {
        self.viewport.total_rendered_height()
    }

    /// Rows to paint, in visible order
    pub fn rendered_lines(&self) -> Vec<RenderedLine> {
        let Some((low, high)) = self.rendered_range() else {
            return Vec::new();
        };
        (low..=high)
            .filter_map(|visible_index| {
                let original_index = self.visible.original_of(visible_index)?;
                let text = self.buffer.line_arc(original_index)?;
                let fold = self.folding.range_at_header(original_index).map(|r| FoldMarker {
                    id: r.id,
                    collapsed: self.folding.is_collapsed(r.id),
                    summary: r.summary.clone(),
                });
                Some(RenderedLine {
                    visible_index,
                    original_index,
                    line_number: self.buffer.line_number_of(original_index),
                    text,
                    markup: self.highlights.peek(original_index).cloned(),
                    fold,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Viewport geometry
    // ------------------------------------------------------------------

    /// Update the scroll container height
    pub fn resize(&mut self, height: f64) {
        self.viewport.resize(height);
    }

    pub fn set_line_height(&mut self, line_height: LineHeight) {
        self.viewport.set_line_height(line_height);
    }

    /// Report the painted height of a visible row
    pub fn measure_line(&mut self, visible_index: usize, height: f64) {
        self.viewport.measure(visible_index, height);
    }

    pub fn scroll_to_visible_index(&mut self, index: usize, align: Align) {
        self.viewport.scroll_to_visible_index(index, align);
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Scroll a display line number into the middle of the viewport
    ///
    /// A line hidden inside collapsed ranges is revealed first. Returns the
    /// visible index scrolled to.
    pub fn scroll_to_line(
        &mut self,
        line_number: usize,
        column: Option<usize>,
    ) -> Result<usize, EngineError> {
        if !self.loaded {
            return Err(EngineError::NoFileLoaded);
        }
        let original = self
            .buffer
            .index_of_line_number(line_number)
            .ok_or_else(|| EngineError::LineOutOfRange {
                line: line_number,
                first: self.buffer.first_line_number(),
                last: self.buffer.last_line_number(),
            })?;

        if self.visible.visible_of(original).is_none() {
            self.reveal(original);
        }
        let visible = self
            .visible
            .visible_of(original)
            .or_else(|| self.visible.nearest_visible(original))
            .unwrap_or(0);

        self.viewport.scroll_to_visible_index(visible, Align::Center);
        self.focus = Some(FocusPosition {
            line_number,
            column,
        });
        Ok(visible)
    }

    /// Expand every collapsed range hiding `original`
    fn reveal(&mut self, original: usize) {
        let hiding: Vec<FoldId> = self
            .folding
            .collapsed_ranges()
            .filter(|r| r.hidden_lines().contains(&original))
            .map(|r| r.id)
            .collect();
        for id in hiding {
            self.folding.expand(id);
        }
        self.viewport.clear_measurements();
        self.reproject();
        self.rerun_search();
        self.emit_folds_changed();
    }

    /// Scroll to a fraction of the loaded content (0-100, clamped)
    ///
    /// Returns the new scroll offset in pixels.
    pub fn scroll_to_percentage(&mut self, pct: f64) -> f64 {
        let pct = if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) };
        let target = self.viewport.max_scroll_top() * pct / 100.0;
        self.viewport.set_scroll_top(target);
        self.viewport.scroll_top()
    }

    /// Scroll to the line containing a file byte offset
    pub fn jump_to_file_position(&mut self, byte_offset: u64) -> Result<usize, EngineError> {
        if !self.loaded {
            return Err(EngineError::NoFileLoaded);
        }
        let start = self.buffer.base_byte_offset();
        let end = start + self.buffer.byte_len();
        let out_of_range = EngineError::OffsetOutOfRange {
            offset: byte_offset,
            start,
            end,
        };
        let relative = byte_offset.checked_sub(start).ok_or(out_of_range.clone())?;
        let index = self.buffer.line_at_byte(relative).ok_or(out_of_range)?;
        self.scroll_to_line(self.buffer.line_number_of(index), None)
    }

    // ------------------------------------------------------------------
    // Folding
    // ------------------------------------------------------------------

    /// Collapse or expand a range; returns whether it is now collapsed
    pub fn toggle_folding_range(&mut self, id: FoldId) -> Result<bool, EngineError> {
        let anchor = self.capture_anchor();
        let collapsed = self
            .folding
            .toggle(id)
            .ok_or_else(|| EngineError::UnknownFoldRange(id.to_string()))?;
        tracing::trace!("Fold {} collapsed={}", id, collapsed);
        self.apply_fold_change(anchor);
        Ok(collapsed)
    }

    pub fn collapse_all(&mut self) {
        let anchor = self.capture_anchor();
        self.folding.collapse_all();
        self.apply_fold_change(anchor);
    }

    pub fn expand_all(&mut self) {
        let anchor = self.capture_anchor();
        self.folding.expand_all();
        self.apply_fold_change(anchor);
    }

    fn apply_fold_change(&mut self, anchor: Option<ScrollAnchor>) {
        self.viewport.clear_measurements();
        self.reproject();
        self.restore_anchor(anchor);
        self.rerun_search();
        self.emit_folds_changed();
    }

    /// Top visible line and how far into it the viewport is scrolled
    fn capture_anchor(&self) -> Option<ScrollAnchor> {
        let (visible_index, pixel_offset) = self.viewport.first_visible()?;
        Some(ScrollAnchor {
            visible_index,
            original_index: self.visible.original_of(visible_index)?,
            pixel_offset,
            line_count: self.buffer.len(),
        })
    }

    /// Bring the anchored buffer line back to the top (or its fold header)
    fn restore_anchor(&mut self, anchor: Option<ScrollAnchor>) {
        let Some(anchor) = anchor else {
            return;
        };
        if let Some(index) = self.visible.nearest_visible(anchor.original_index) {
            let offset = if self.visible.visible_of(anchor.original_index).is_some() {
                anchor.pixel_offset
            } else {
                0.0
            };
            self.viewport.scroll_to_visible_index(index, Align::Start);
            self.viewport.scroll_by(offset);
        }
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Search the visible lines; results are also sent to subscribers
    pub fn search(&mut self, term: &str) -> &SearchOutcome {
        if self.search.update(term, &self.visible, &self.buffer) {
            self.emit_search_results();
        }
        self.search.outcome()
    }

    pub fn search_results(&self) -> &[SearchResult] {
        self.search.results()
    }

    pub fn is_search_limited(&self) -> bool {
        self.search.is_limited()
    }

    pub fn search_engine(&self) -> &SearchEngine {
        &self.search
    }

    /// Scroll to result `active` and focus its position
    pub fn scroll_to_match(&mut self, active: usize) -> Result<usize, EngineError> {
        let result = self
            .search
            .results()
            .get(active)
            .map(|r| (r.line, r.column))
            .ok_or(EngineError::NoSearchMatch(active))?;
        self.scroll_to_line(result.0, Some(result.1))
    }

    /// Re-run the current term if the visible length moved enough
    fn rerun_search(&mut self) {
        if self.search.term().is_empty() {
            return;
        }
        let term = self.search.term().to_string();
        if self.search.update(&term, &self.visible, &self.buffer) {
            self.emit_search_results();
        }
    }

    /// Drop the term and results, telling subscribers if there were any
    fn clear_search(&mut self) {
        if self.search.term().is_empty() {
            return;
        }
        self.search.clear();
        self.emit_search_results();
    }

    fn emit_search_results(&mut self) {
        let event = EngineEvent::SearchResults {
            results: self.search.results().to_vec(),
            is_limited: self.search.is_limited(),
        };
        self.emit(event);
    }

    // ------------------------------------------------------------------
    // Incremental loading
    // ------------------------------------------------------------------

    /// Feed a scroll event from the host's container
    ///
    /// Returns a ticket when more content should be requested; the host
    /// fetches it and calls [`LineEngine::complete_load`] or
    /// [`LineEngine::fail_load`].
    pub fn on_scroll(&mut self, event: ScrollEvent, now: Instant) -> Option<LoadTicket> {
        if !self.loaded {
            return None;
        }
        if self.viewport.height() != event.viewport_height {
            self.viewport.resize(event.viewport_height);
        }
        self.viewport.set_scroll_top(event.scroll_top);

        let direction = self.loader.on_scroll(&event, now)?;
        self.begin_load(direction, now)
    }

    /// Take the directional lock and describe what to fetch
    pub fn begin_load(&mut self, direction: Direction, now: Instant) -> Option<LoadTicket> {
        if !self.loaded {
            return None;
        }
        let request = LoadRequest {
            direction,
            first_line_number: self.buffer.first_line_number(),
            last_line_number: self.buffer.last_line_number(),
            start_byte: self.buffer.base_byte_offset(),
            end_byte: self.buffer.base_byte_offset() + self.buffer.byte_len(),
        };
        let anchor = match direction {
            Direction::Top => self.capture_anchor(),
            Direction::Bottom => None,
        };
        self.loader.begin(request, anchor, now)
    }

    /// Splice fetched lines in; returns how many were added
    ///
    /// Tickets issued before the last `load_file` or `close` are ignored.
    pub fn complete_load<I, S>(&mut self, ticket: &LoadTicket, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let direction = ticket.direction();
        if !self.loaded || !self.loader.is_current(ticket) {
            tracing::debug!(
                "Dropping {} load #{}: issued for a file that is no longer loaded",
                direction,
                ticket.id
            );
            return 0;
        }
        let added = match direction {
            Direction::Top => self.buffer.prepend(lines),
            Direction::Bottom => self.buffer.append(lines),
        };

        if added == 0 {
            self.loader.complete(ticket, 0);
            return 0;
        }

        if direction == Direction::Top {
            self.folding.shift_collapsed(added);
            self.search.shift_indices(added);
            self.viewport.clear_measurements();
        }
        self.reparse();
        self.reproject();

        // Two phases: align the shifted index, then restore the sub-line offset
        if let Some(restore) = self.loader.complete(ticket, added) {
            let index = self
                .visible
                .visible_of(restore.original_index)
                .unwrap_or(restore.visible_index);
            self.viewport.scroll_to_visible_index(index, Align::Start);
            self.viewport.scroll_by(restore.pixel_offset);
        }

        tracing::debug!(
            "Spliced {} lines at the {} (now {} lines, starting at line {})",
            added,
            direction,
            self.buffer.len(),
            self.buffer.first_line_number()
        );

        self.highlights.set_line_count(self.buffer.len());
        self.rerun_search();
        self.emit(EngineEvent::BufferSpliced {
            direction,
            lines_added: added,
            line_count: self.buffer.len(),
        });
        self.emit_folds_changed();
        added
    }

    /// Record a failed fetch; the buffer is left untouched
    pub fn fail_load(&mut self, ticket: &LoadTicket, error: &anyhow::Error) {
        self.loader.fail(ticket, error);
    }

    /// Fetch and splice content for a ticket
    pub async fn fulfill(&mut self, ticket: LoadTicket, source: &mut dyn ContentSource) -> usize {
        let fetched = match ticket.direction() {
            Direction::Top => source.load_before(ticket.request).await,
            Direction::Bottom => source.load_after(ticket.request).await,
        };
        match fetched {
            Ok(lines) => self.complete_load(&ticket, lines),
            Err(e) => {
                self.fail_load(&ticket, &e);
                0
            }
        }
    }

    /// Load more content at one edge, if that edge is not locked
    pub async fn load_more(&mut self, direction: Direction, source: &mut dyn ContentSource) -> usize {
        match self.begin_load(direction, Instant::now()) {
            Some(ticket) => self.fulfill(ticket, source).await,
            None => 0,
        }
    }

    /// Feed a scroll event and fetch from `source` if it triggers a load
    pub async fn handle_scroll(
        &mut self,
        event: ScrollEvent,
        source: &mut dyn ContentSource,
    ) -> usize {
        match self.on_scroll(event, Instant::now()) {
            Some(ticket) => self.fulfill(ticket, source).await,
            None => 0,
        }
    }

    // ------------------------------------------------------------------
    // Highlighting
    // ------------------------------------------------------------------

    /// Plan one highlight batch for the rows about to be painted
    pub fn plan_highlights(&mut self) -> Option<HighlightBatch> {
        let (low, high) = self.rendered_range()?;
        let rendered: Vec<(usize, Arc<str>)> = (low..=high)
            .filter_map(|v| {
                let original = self.visible.original_of(v)?;
                Some((original, self.buffer.line_arc(original)?))
            })
            .collect();
        self.highlights.plan_batch(rendered)
    }

    /// Merge highlight results; returns how many lines got markup
    pub fn apply_highlights(
        &mut self,
        batch: &HighlightBatch,
        results: Vec<anyhow::Result<String>>,
    ) -> usize {
        let applied = self.highlights.apply_batch(batch, results);
        if applied > 0 {
            let lines = batch
                .indices
                .iter()
                .copied()
                .filter(|&i| self.highlights.is_cached(i))
                .collect();
            self.emit(EngineEvent::HighlightsUpdated { lines });
        }
        applied
    }

    /// Highlight the rendered rows with `service`
    pub async fn refresh_highlights(&mut self, service: &dyn HighlightService) -> usize {
        let Some(batch) = self.plan_highlights() else {
            return 0;
        };
        let results = highlight_batch(&batch, service).await;
        self.apply_highlights(&batch, results)
    }

    pub fn highlights(&self) -> &HighlightCoordinator {
        &self.highlights
    }
}
