use std::collections::BTreeMap;

/// Where a target line should land when scrolling to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    /// Target line at the top of the viewport
    #[default]
    Start,
    /// Target line in the middle of the viewport
    Center,
    /// Target line at the bottom of the viewport
    End,
    /// Scroll only if the line is not fully visible, by the smallest amount
    Auto,
}

/// Height of visible lines
#[derive(Debug, Clone, PartialEq)]
pub enum LineHeight {
    /// Every line has the same height in pixels
    Fixed(f64),
    /// Lines default to `default` pixels; some have been measured by the host
    Measured {
        default: f64,
        measured: BTreeMap<usize, f64>,
    },
}

impl LineHeight {
    fn default_height(&self) -> f64 {
        match self {
            LineHeight::Fixed(h) => *h,
            LineHeight::Measured { default, .. } => *default,
        }
    }
}

/// The viewport - which part of the visible line sequence is on screen
///
/// All positions are pixels from the top of the (virtual) content. Indices are
/// visible-sequence indices, never buffer indices.
#[derive(Debug, Clone)]
pub struct Viewport {
    /// Scroll position (pixels from the top of the content)
    scroll_top: f64,

    /// Container height in pixels
    height: f64,

    /// Extra rows rendered above and below the visible rows
    pub overscan: usize,

    /// Number of lines in the visible sequence
    item_count: usize,

    line_height: LineHeight,

    /// For measured heights: `(index, sum of height deltas of measured lines <= index)`
    delta_prefix: Vec<(usize, f64)>,
}

impl Viewport {
    /// Create a new viewport with fixed line height
    pub fn new(height: f64, line_height: f64, overscan: usize) -> Self {
        Self {
            scroll_top: 0.0,
            height: height.max(0.0),
            overscan,
            item_count: 0,
            line_height: LineHeight::Fixed(line_height),
            delta_prefix: Vec::new(),
        }
    }

    /// Switch between fixed and measured line heights
    pub fn set_line_height(&mut self, line_height: LineHeight) {
        self.line_height = line_height;
        self.rebuild_deltas();
        self.clamp_scroll();
    }

    pub fn line_height(&self) -> &LineHeight {
        &self.line_height
    }

    /// Record the measured height of one line (switches to measured mode)
    pub fn measure(&mut self, index: usize, height: f64) {
        let default = self.line_height.default_height();
        match &mut self.line_height {
            LineHeight::Fixed(_) => {
                let mut measured = BTreeMap::new();
                measured.insert(index, height);
                self.line_height = LineHeight::Measured { default, measured };
            }
            LineHeight::Measured { measured, .. } => {
                measured.insert(index, height);
            }
        }
        self.rebuild_deltas();
        self.clamp_scroll();
    }

    /// Forget measured heights; they are keyed by visible index, which a
    /// prepend or fold change invalidates
    pub fn clear_measurements(&mut self) {
        if let LineHeight::Measured { measured, .. } = &mut self.line_height {
            if measured.is_empty() {
                return;
            }
            measured.clear();
            self.rebuild_deltas();
            self.clamp_scroll();
        }
    }

    fn rebuild_deltas(&mut self) {
        self.delta_prefix.clear();
        if let LineHeight::Measured { default, measured } = &self.line_height {
            let mut sum = 0.0;
            for (&index, &h) in measured.iter() {
                sum += h - default;
                self.delta_prefix.push((index, sum));
            }
        }
    }

    /// Update container height
    pub fn resize(&mut self, height: f64) {
        self.height = height.max(0.0);
        self.clamp_scroll();
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Update the number of lines in the visible sequence
    pub fn set_item_count(&mut self, count: usize) {
        self.item_count = count;
        if let LineHeight::Measured { measured, .. } = &mut self.line_height {
            measured.retain(|&i, _| i < count);
        }
        self.rebuild_deltas();
        self.clamp_scroll();
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Height of the line at `index`
    pub fn height_of(&self, index: usize) -> f64 {
        match &self.line_height {
            LineHeight::Fixed(h) => *h,
            LineHeight::Measured { default, measured } => {
                measured.get(&index).copied().unwrap_or(*default)
            }
        }
    }

    /// Pixel offset of the top of line `index`
    pub fn offset_of(&self, index: usize) -> f64 {
        let base = index as f64 * self.line_height.default_height();
        // Deltas of measured lines strictly before `index`
        let before = self.delta_prefix.partition_point(|&(i, _)| i < index);
        match before.checked_sub(1) {
            Some(last) => base + self.delta_prefix[last].1,
            None => base,
        }
    }

    /// Height of all lines in the visible sequence
    pub fn total_rendered_height(&self) -> f64 {
        self.offset_of(self.item_count)
    }

    pub fn max_scroll_top(&self) -> f64 {
        (self.total_rendered_height() - self.height).max(0.0)
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    /// Set the scroll position, clamped to the content
    pub fn set_scroll_top(&mut self, scroll_top: f64) {
        self.scroll_top = scroll_top;
        self.clamp_scroll();
    }

    /// Scroll by a pixel delta (negative scrolls up)
    pub fn scroll_by(&mut self, delta: f64) {
        self.set_scroll_top(self.scroll_top + delta);
    }

    fn clamp_scroll(&mut self) {
        if !self.scroll_top.is_finite() {
            self.scroll_top = 0.0;
        }
        self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll_top());
    }

    /// Index of the line covering pixel offset `offset`
    pub fn index_at_offset(&self, offset: f64) -> Option<usize> {
        if self.item_count == 0 {
            return None;
        }
        // Largest index whose top is <= offset
        let (mut lo, mut hi) = (0usize, self.item_count);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.offset_of(mid) <= offset {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Some(lo)
    }

    /// First line at least partially on screen, with how far its top is scrolled past
    pub fn first_visible(&self) -> Option<(usize, f64)> {
        let index = self.index_at_offset(self.scroll_top)?;
        Some((index, self.scroll_top - self.offset_of(index)))
    }

    /// Lines on screen, without overscan (inclusive)
    pub fn visible_range(&self) -> Option<(usize, usize)> {
        let first = self.index_at_offset(self.scroll_top)?;
        let bottom = self.scroll_top + self.height;
        let mut last = self.index_at_offset(bottom)?;
        // A line whose top sits exactly on the bottom edge is not on screen
        if last > first && self.offset_of(last) >= bottom {
            last -= 1;
        }
        Some((first, last))
    }

    /// Lines the host must paint: the visible range plus overscan (inclusive)
    pub fn rendered_range(&self) -> Option<(usize, usize)> {
        let (first, last) = self.visible_range()?;
        let low = first.saturating_sub(self.overscan);
        let high = last
            .saturating_add(self.overscan)
            .min(self.item_count.saturating_sub(1));
        Some((low, high))
    }

    /// Check if a line is fully on screen
    pub fn is_index_visible(&self, index: usize) -> bool {
        if index >= self.item_count {
            return false;
        }
        let top = self.offset_of(index);
        let bottom = top + self.height_of(index);
        top >= self.scroll_top && bottom <= self.scroll_top + self.height
    }

    /// Scroll so that line `index` lands according to `align`
    pub fn scroll_to_visible_index(&mut self, index: usize, align: Align) {
        if self.item_count == 0 {
            self.scroll_top = 0.0;
            return;
        }
        let index = index.min(self.item_count - 1);
        let top = self.offset_of(index);
        let line_height = self.height_of(index);

        let target = match align {
            Align::Start => top,
            Align::End => top + line_height - self.height,
            Align::Center => top + line_height / 2.0 - self.height / 2.0,
            Align::Auto => {
                if self.is_index_visible(index) {
                    return;
                } else if top < self.scroll_top {
                    top
                } else {
                    top + line_height - self.height
                }
            }
        };
        self.set_scroll_top(target);
    }
}
