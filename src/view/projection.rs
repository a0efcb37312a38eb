//! Visible line sequence: the buffer minus the interiors of collapsed folds
//!
//! The projection stores original (buffer) indices only; text is looked up in
//! the buffer on demand. With nothing collapsed it is the identity and holds
//! no allocation at all.

use crate::model::folding::FoldingIndex;
use crate::model::line_buffer::LineBuffer;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Projection {
    /// Every buffer line is visible
    Identity { len: usize },
    /// Strictly increasing original indices of the visible lines
    Filtered(Vec<usize>),
}

/// Mapping between visible (virtual) indices and original buffer indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleSequence {
    projection: Projection,
}

impl Default for VisibleSequence {
    fn default() -> Self {
        Self::identity(0)
    }
}

impl VisibleSequence {
    /// All `len` buffer lines visible
    pub fn identity(len: usize) -> Self {
        Self {
            projection: Projection::Identity { len },
        }
    }

    /// Project `buffer_len` lines through the collapsed ranges of `folding`
    pub fn project(buffer_len: usize, folding: &FoldingIndex) -> Self {
        if !folding.has_collapsed() {
            return Self::identity(buffer_len);
        }

        // Collapsed ranges come sorted by start line; nested ones overlap and
        // are merged into the running interval.
        let mut hidden: Vec<(usize, usize)> = Vec::new();
        for range in folding.collapsed_ranges() {
            let lines = range.hidden_lines();
            let (start, end) = (*lines.start(), (*lines.end()).min(buffer_len.saturating_sub(1)));
            if lines.is_empty() || start > end {
                continue;
            }
            match hidden.last_mut() {
                Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
                _ => hidden.push((start, end)),
            }
        }

        let hidden_count: usize = hidden.iter().map(|(s, e)| e - s + 1).sum();
        let mut visible = Vec::with_capacity(buffer_len.saturating_sub(hidden_count));
        let mut intervals = hidden.iter().peekable();
        let mut index = 0;
        while index < buffer_len {
            match intervals.peek() {
                Some(&&(start, end)) if index >= start => {
                    index = end + 1;
                    intervals.next();
                }
                Some(&&(start, _)) => {
                    visible.extend(index..start.min(buffer_len));
                    index = start;
                }
                None => {
                    visible.extend(index..buffer_len);
                    index = buffer_len;
                }
            }
        }

        Self {
            projection: Projection::Filtered(visible),
        }
    }

    pub fn len(&self) -> usize {
        match &self.projection {
            Projection::Identity { len } => *len,
            Projection::Filtered(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether nothing is hidden
    pub fn is_identity(&self) -> bool {
        matches!(self.projection, Projection::Identity { .. })
    }

    /// Original buffer index of visible index `visible`
    pub fn original_of(&self, visible: usize) -> Option<usize> {
        match &self.projection {
            Projection::Identity { len } => (visible < *len).then_some(visible),
            Projection::Filtered(v) => v.get(visible).copied(),
        }
    }

    /// Visible index of original line `original`, or `None` if it is hidden
    pub fn visible_of(&self, original: usize) -> Option<usize> {
        match &self.projection {
            Projection::Identity { len } => (original < *len).then_some(original),
            Projection::Filtered(v) => v.binary_search(&original).ok(),
        }
    }

    /// Visible index of `original`, or of the nearest visible line before it
    ///
    /// A line hidden inside a collapsed range maps to the range's header.
    pub fn nearest_visible(&self, original: usize) -> Option<usize> {
        match &self.projection {
            Projection::Identity { len } => {
                (*len > 0).then(|| original.min(len - 1))
            }
            Projection::Filtered(v) => {
                let after = v.partition_point(|&o| o <= original);
                after.checked_sub(1).or((!v.is_empty()).then_some(0))
            }
        }
    }

    /// Original indices in visible order
    pub fn originals(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        match &self.projection {
            Projection::Identity { len } => Box::new(0..*len),
            Projection::Filtered(v) => Box::new(v.iter().copied()),
        }
    }

    /// `(line_text, original_index)` pairs in visible order
    pub fn lines<'a>(
        &'a self,
        buffer: &'a LineBuffer,
    ) -> impl Iterator<Item = (&'a str, usize)> + 'a {
        self.originals()
            .filter_map(move |original| buffer.line(original).map(|text| (text, original)))
    }

    /// Text of the line at visible index `visible`
    pub fn line<'a>(&self, buffer: &'a LineBuffer, visible: usize) -> Option<&'a str> {
        self.original_of(visible).and_then(|o| buffer.line(o))
    }
}
