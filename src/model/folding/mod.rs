//! Structural folding ranges
//!
//! Ranges are derived from the loaded lines by a best-effort structural scan
//! (JSON brackets, markup tags, YAML indentation). They are never patched:
//! every structural change rebuilds the whole set, and collapsed state is
//! carried over by id.
//!
//! A range's id is its category plus start and end line, so an unchanged
//! buffer always regenerates the same ids.

mod json;
mod markup;
mod yaml;

use crate::config::FoldingConfig;
use crate::model::line_buffer::LineBuffer;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::RangeInclusive;

/// Structural family used to pick a folding scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StructureKind {
    /// JSON and JSON Lines
    Json,
    /// XML, HTML, SVG
    Markup,
    Yaml,
    /// No known structure; JSON-looking content is still folded
    #[default]
    None,
}

/// Discriminant of a [`FoldKind`], part of the range id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FoldCategory {
    Object,
    Array,
    Element,
    Block,
}

impl FoldCategory {
    fn as_str(&self) -> &'static str {
        match self {
            FoldCategory::Object => "object",
            FoldCategory::Array => "array",
            FoldCategory::Element => "element",
            FoldCategory::Block => "block",
        }
    }
}

/// Kind of a foldable range with its kind-specific payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldKind {
    /// JSON object, with the key it is assigned to (if any)
    Object { key: Option<String> },
    /// JSON array, with its number of top-level elements
    Array { items: usize },
    /// Markup element
    Element { tag: String },
    /// YAML mapping/sequence block under `key:`
    Block { key: String },
}

impl FoldKind {
    pub fn category(&self) -> FoldCategory {
        match self {
            FoldKind::Object { .. } => FoldCategory::Object,
            FoldKind::Array { .. } => FoldCategory::Array,
            FoldKind::Element { .. } => FoldCategory::Element,
            FoldKind::Block { .. } => FoldCategory::Block,
        }
    }

    /// Whether the range ends on a closing delimiter line
    pub fn has_closing_line(&self) -> bool {
        !matches!(self, FoldKind::Block { .. })
    }

    /// Placeholder text shown on a collapsed header
    pub fn summary(&self) -> String {
        match self {
            FoldKind::Object { key: Some(key) } => format!("\"{key}\": {{...}}"),
            FoldKind::Object { key: None } => "{...}".to_string(),
            FoldKind::Array { items: 0 } => "[]".to_string(),
            FoldKind::Array { items: 1 } => "[1 item]".to_string(),
            FoldKind::Array { items } => format!("[{items} items]"),
            FoldKind::Element { tag } => format!("<{tag}>...</{tag}>"),
            FoldKind::Block { key } => format!("{key}: ..."),
        }
    }
}

/// Stable identity of a folding range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FoldId {
    pub category: FoldCategory,
    pub start_line: usize,
    pub end_line: usize,
}

impl FoldId {
    /// Same range moved down by `lines` (after a prepend)
    pub fn shifted(self, lines: usize) -> Self {
        Self {
            start_line: self.start_line + lines,
            end_line: self.end_line + lines,
            ..self
        }
    }
}

impl fmt::Display for FoldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}",
            self.category.as_str(),
            self.start_line,
            self.end_line
        )
    }
}

/// A contiguous span of buffer lines that can be collapsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldableRange {
    pub id: FoldId,
    /// Header line (stays visible when collapsed)
    pub start_line: usize,
    /// Last line of the range (inclusive), always > `start_line`
    pub end_line: usize,
    pub kind: FoldKind,
    /// Depth of the range in the forest, 0 for outermost
    pub nesting_level: usize,
    pub summary: String,
}

impl FoldableRange {
    pub fn new(kind: FoldKind, start_line: usize, end_line: usize, nesting_level: usize) -> Self {
        let id = FoldId {
            category: kind.category(),
            start_line,
            end_line,
        };
        let summary = kind.summary();
        Self {
            id,
            start_line,
            end_line,
            kind,
            nesting_level,
            summary,
        }
    }

    /// Lines hidden when this range is collapsed
    ///
    /// The header stays visible, and so does a closing `}`, `]` or end tag.
    /// YAML blocks have no closing line and hide through `end_line`.
    pub fn hidden_lines(&self) -> RangeInclusive<usize> {
        let last = if self.kind.has_closing_line() {
            self.end_line - 1
        } else {
            self.end_line
        };
        (self.start_line + 1)..=last
    }

    pub fn contains(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// Pick the scanner for a buffer, falling back to JSON for JSON-looking text
pub fn effective_kind(kind: StructureKind, lines: &[&str]) -> StructureKind {
    match kind {
        StructureKind::None if looks_like_json(lines) => StructureKind::Json,
        other => other,
    }
}

/// Whether content starts with `{`/`[` and ends with the matching close
pub fn looks_like_json(lines: &[&str]) -> bool {
    let first = lines.iter().map(|l| l.trim()).find(|l| !l.is_empty());
    let last = lines.iter().rev().map(|l| l.trim()).find(|l| !l.is_empty());
    match (first, last) {
        (Some(first), Some(last)) => {
            (first.starts_with('{') && last.ends_with('}'))
                || (first.starts_with('[') && last.ends_with(']'))
        }
        _ => false,
    }
}

/// Parse foldable ranges out of `lines` with the scanner for `kind`
///
/// The result is sorted by start line, outer ranges before inner ones. Nested
/// ranges with the same span (`[[` ... `]]`) share an id, so only the
/// outermost of them is kept.
pub fn parse_ranges(lines: &[&str], kind: StructureKind) -> Vec<FoldableRange> {
    let mut ranges = match effective_kind(kind, lines) {
        StructureKind::Json => json::parse(lines),
        StructureKind::Markup => markup::parse(lines),
        StructureKind::Yaml => yaml::parse(lines),
        StructureKind::None => Vec::new(),
    };
    ranges.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then(b.end_line.cmp(&a.end_line))
            .then(a.nesting_level.cmp(&b.nesting_level))
    });
    ranges.dedup_by_key(|r| r.id);
    ranges
}

/// Folding ranges of the current buffer plus the set of collapsed ids
#[derive(Debug, Clone, Default)]
pub struct FoldingIndex {
    /// Sorted by start line, outer before inner
    ranges: Vec<FoldableRange>,
    by_id: HashMap<FoldId, usize>,
    /// Header line -> outermost range starting there
    by_start: HashMap<usize, usize>,
    collapsed: HashSet<FoldId>,
    /// Only a prefix of the buffer was scanned
    truncated: bool,
}

impl FoldingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-derive all ranges from the buffer
    ///
    /// Collapsed ids that the new parse no longer produces are dropped.
    pub fn rebuild(&mut self, buffer: &LineBuffer, kind: StructureKind, config: &FoldingConfig) {
        if !config.enabled {
            self.set_ranges(Vec::new(), false);
            return;
        }

        let truncated = buffer.len() > config.large_buffer_lines;
        let limit = if truncated {
            config.large_buffer_prefix
        } else {
            buffer.len()
        };
        let lines: Vec<&str> = buffer.iter().take(limit).collect();
        let ranges = parse_ranges(&lines, kind);

        tracing::debug!(
            "Folding rebuilt: {} ranges from {} of {} lines ({:?})",
            ranges.len(),
            lines.len(),
            buffer.len(),
            kind
        );
        self.set_ranges(ranges, truncated);
    }

    fn set_ranges(&mut self, ranges: Vec<FoldableRange>, truncated: bool) {
        self.by_id.clear();
        self.by_start.clear();
        for (i, range) in ranges.iter().enumerate() {
            self.by_id.insert(range.id, i);
            // Sorted outer-first, so the first range seen at a line is the outermost
            self.by_start.entry(range.start_line).or_insert(i);
        }
        self.ranges = ranges;
        self.truncated = truncated;

        let by_id = &self.by_id;
        self.collapsed.retain(|id| by_id.contains_key(id));
    }

    /// Move collapsed ids down by `lines` so they follow content after a prepend
    pub fn shift_collapsed(&mut self, lines: usize) {
        if lines == 0 || self.collapsed.is_empty() {
            return;
        }
        self.collapsed = self.collapsed.drain().map(|id| id.shifted(lines)).collect();
    }

    /// Drop all ranges and collapsed state
    pub fn clear(&mut self) {
        self.collapsed.clear();
        self.set_ranges(Vec::new(), false);
    }

    pub fn ranges(&self) -> &[FoldableRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Whether only a prefix of the buffer was scanned
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn range(&self, id: FoldId) -> Option<&FoldableRange> {
        self.by_id.get(&id).map(|&i| &self.ranges[i])
    }

    /// Outermost range whose header is `line`
    pub fn range_at_header(&self, line: usize) -> Option<&FoldableRange> {
        self.by_start.get(&line).map(|&i| &self.ranges[i])
    }

    pub fn is_header(&self, line: usize) -> bool {
        self.by_start.contains_key(&line)
    }

    /// Innermost range containing `line`
    pub fn range_containing(&self, line: usize) -> Option<&FoldableRange> {
        self.ranges
            .iter()
            .take_while(|r| r.start_line <= line)
            .filter(|r| r.contains(line))
            .max_by_key(|r| r.nesting_level)
    }

    pub fn is_collapsed(&self, id: FoldId) -> bool {
        self.collapsed.contains(&id)
    }

    pub fn has_collapsed(&self) -> bool {
        !self.collapsed.is_empty()
    }

    /// Collapsed ranges in start-line order
    pub fn collapsed_ranges(&self) -> impl Iterator<Item = &FoldableRange> {
        self.ranges
            .iter()
            .filter(move |r| self.collapsed.contains(&r.id))
    }

    /// Flip the collapsed state of a range, returning the new state
    ///
    /// Returns `None` for an id the current parse does not know.
    pub fn toggle(&mut self, id: FoldId) -> Option<bool> {
        if !self.by_id.contains_key(&id) {
            return None;
        }
        if self.collapsed.remove(&id) {
            Some(false)
        } else {
            self.collapsed.insert(id);
            Some(true)
        }
    }

    pub fn collapse(&mut self, id: FoldId) -> bool {
        self.by_id.contains_key(&id) && self.collapsed.insert(id)
    }

    pub fn expand(&mut self, id: FoldId) -> bool {
        self.collapsed.remove(&id)
    }

    pub fn collapse_all(&mut self) {
        self.collapsed = self.ranges.iter().map(|r| r.id).collect();
    }

    pub fn expand_all(&mut self) {
        self.collapsed.clear();
    }
}
