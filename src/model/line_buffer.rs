//! In-memory window of a (potentially huge) file, one entry per line
//!
//! # Design
//! - **Both ends grow cheaply**: lines live in a `VecDeque`, so prepending or
//!   appending `k` lines costs O(k) regardless of how much is already loaded.
//! - **Relative offsets**: line start offsets are stored against a moving
//!   origin. A prepend pushes smaller values at the front instead of shifting
//!   every existing offset.
//! - **Display numbering**: the buffer remembers which file line and byte
//!   offset its first entry corresponds to, so a window loaded from the middle
//!   of a file still reports real line numbers.

use std::collections::VecDeque;
use std::sync::Arc;

/// Bytes counted for the line terminator of every stored line
const LINE_TERMINATOR_LEN: i64 = 1;

/// Ordered sequence of immutable lines with cumulative byte offsets
#[derive(Debug, Clone)]
pub struct LineBuffer {
    lines: VecDeque<Arc<str>>,

    /// Start offset of each line in origin coordinates.
    /// `starts[i] - starts[0]` is the offset of line `i` from the buffer start.
    starts: VecDeque<i64>,

    /// Offset just past the last line, in origin coordinates
    end: i64,

    /// 1-based file line number of `lines[0]`
    first_line_number: usize,

    /// File byte offset of `lines[0]`
    base_byte_offset: u64,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    /// Create an empty buffer positioned at the start of a file
    pub fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            starts: VecDeque::new(),
            end: 0,
            first_line_number: 1,
            base_byte_offset: 0,
        }
    }

    /// Create a buffer holding `lines`, starting at file line 1 / byte 0
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let mut buffer = Self::new();
        buffer.append(lines);
        buffer
    }

    /// Create a buffer from text, splitting on `\n` (a trailing `\r` is dropped)
    pub fn from_text(text: &str) -> Self {
        Self::from_lines(split_lines(text))
    }

    /// Number of loaded lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total bytes covered by the loaded lines, terminators included
    pub fn byte_len(&self) -> u64 {
        match self.starts.front() {
            Some(first) => (self.end - first) as u64,
            None => 0,
        }
    }

    /// Get the line at buffer index `index`
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(|l| l.as_ref())
    }

    /// Get a shared handle to the line at `index`
    pub fn line_arc(&self, index: usize) -> Option<Arc<str>> {
        self.lines.get(index).cloned()
    }

    /// Iterate over all loaded lines in order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator + '_ {
        self.lines.iter().map(|l| l.as_ref())
    }

    /// Get up to `count` lines starting at `start`
    pub fn lines_in_range(&self, start: usize, count: usize) -> Vec<&str> {
        self.lines
            .range(start.min(self.len())..start.saturating_add(count).min(self.len()))
            .map(|l| l.as_ref())
            .collect()
    }

    /// Byte length of the line at `index` (terminator included)
    pub fn line_byte_len(&self, index: usize) -> Option<u64> {
        self.lines
            .get(index)
            .map(|l| (l.len() as i64 + LINE_TERMINATOR_LEN) as u64)
    }

    /// Offset of the start of line `index` from the start of the buffer
    pub fn line_start_byte(&self, index: usize) -> Option<u64> {
        let first = *self.starts.front()?;
        self.starts.get(index).map(|s| (s - first) as u64)
    }

    /// Map a byte offset relative to the buffer start to the line containing it
    ///
    /// Offsets at or past the end map to `None`.
    pub fn line_at_byte(&self, offset: u64) -> Option<usize> {
        if offset >= self.byte_len() {
            return None;
        }
        let first = *self.starts.front()?;
        let target = first + offset as i64;
        let after = self.starts.partition_point(|&s| s <= target);
        Some(after.saturating_sub(1))
    }

    /// 1-based file line number of buffer index 0
    pub fn first_line_number(&self) -> usize {
        self.first_line_number
    }

    /// File line number of the last loaded line
    pub fn last_line_number(&self) -> usize {
        self.first_line_number + self.len().saturating_sub(1)
    }

    /// 1-based file line number of buffer index `index`
    pub fn line_number_of(&self, index: usize) -> usize {
        self.first_line_number + index
    }

    /// Buffer index of a 1-based file line number, if loaded
    pub fn index_of_line_number(&self, line_number: usize) -> Option<usize> {
        let index = line_number.checked_sub(self.first_line_number)?;
        (index < self.len()).then_some(index)
    }

    /// File byte offset of buffer index 0
    pub fn base_byte_offset(&self) -> u64 {
        self.base_byte_offset
    }

    /// Set where in the file this window starts
    pub fn set_origin(&mut self, first_line_number: usize, base_byte_offset: u64) {
        self.first_line_number = first_line_number.max(1);
        self.base_byte_offset = base_byte_offset;
    }

    /// Append lines after the current last line
    pub fn append<I, S>(&mut self, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let before = self.len();
        for line in lines {
            let line: Arc<str> = line.into();
            self.starts.push_back(self.end);
            self.end += line.len() as i64 + LINE_TERMINATOR_LEN;
            self.lines.push_back(line);
        }
        self.len() - before
    }

    /// Prepend lines before the current first line
    ///
    /// Every existing line index shifts up by the number of lines added.
    /// The display origin moves back by the same amount.
    pub fn prepend<I, S>(&mut self, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let new_lines: Vec<Arc<str>> = lines.into_iter().map(Into::into).collect();
        let mut added_bytes: u64 = 0;
        for line in new_lines.iter().rev() {
            let len = line.len() as i64 + LINE_TERMINATOR_LEN;
            let next_start = self.starts.front().copied().unwrap_or(self.end);
            self.starts.push_front(next_start - len);
            self.lines.push_front(line.clone());
            added_bytes += len as u64;
        }
        let count = new_lines.len();
        self.first_line_number = self.first_line_number.saturating_sub(count).max(1);
        self.base_byte_offset = self.base_byte_offset.saturating_sub(added_bytes);
        count
    }

    /// Replace the whole content, keeping the current origin
    pub fn replace_all<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.lines.clear();
        self.starts.clear();
        self.end = 0;
        self.append(lines);
    }

    /// Drop all content and reset the origin
    pub fn clear(&mut self) {
        self.replace_all(std::iter::empty::<Arc<str>>());
        self.set_origin(1, 0);
    }
}

/// Split text into lines the way the buffer stores them
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    let empty = text.is_empty();
    trimmed
        .split('\n')
        .filter(move |_| !empty)
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
}
