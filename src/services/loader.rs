//! Bidirectional incremental loading
//!
//! # Design
//! - **Trigger policy**: a load fires only when the scroll position is near an
//!   edge *and* the user is clearly moving towards it. Deltas under
//!   `min_scroll_delta_px` carry no direction. The top edge additionally needs
//!   several consecutive upward events, so an elastic overscroll bounce cannot
//!   fire a prepend.
//! - **Directional locks**: at most one request per edge is outstanding. A lock
//!   expires after `lock_timeout_ms` so a collaborator that never answers only
//!   blocks that edge temporarily. Expiry does not retract the old request; its
//!   completion is still applied but cannot release a newer lock.
//! - **Anchor restore**: a prepend shifts every index. The anchor captured
//!   before the request is moved by the number of lines added, scrolled to with
//!   `Align::Start`, then fine-tuned by the saved pixel offset.
//!
//! The loader itself never touches the buffer. It is a synchronous state
//! machine so hosts and tests can drive it with explicit timestamps.

use crate::config::LoaderConfig;
use async_trait::async_trait;
use std::fmt;
use std::time::{Duration, Instant};

/// Edge of the loaded window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Top,
    Bottom,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Top => write!(f, "top"),
            Direction::Bottom => write!(f, "bottom"),
        }
    }
}

/// Scroll notification from the host's scroll container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    /// Current scroll offset in pixels
    pub scroll_top: f64,
    /// Height of the scroll container
    pub viewport_height: f64,
    /// Height of all content in the container
    pub content_height: f64,
}

/// Visual position captured right before a splice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnchor {
    /// Visible index of the first line on screen
    pub visible_index: usize,
    /// Buffer index of that same line
    pub original_index: usize,
    /// How far that line's top is scrolled past the viewport top
    pub pixel_offset: f64,
    /// Buffer line count when the anchor was captured
    pub line_count: usize,
}

/// Where to scroll after a prepend so the same content stays on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollRestore {
    /// Visible index of the anchored line after the prepend
    pub visible_index: usize,
    /// Buffer index of the anchored line after the prepend
    pub original_index: usize,
    /// Pixel offset applied after aligning the line to the top
    pub pixel_offset: f64,
}

/// What the content source is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadRequest {
    pub direction: Direction,
    /// 1-based file line number of the first loaded line
    pub first_line_number: usize,
    /// 1-based file line number of the last loaded line
    pub last_line_number: usize,
    /// File byte offset of the first loaded line
    pub start_byte: u64,
    /// File byte offset just past the last loaded line
    pub end_byte: u64,
}

/// An outstanding load, returned when a request is issued
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTicket {
    pub id: u64,
    /// Loader session the ticket was issued in; bumped by every reset
    pub session: u64,
    pub request: LoadRequest,
    /// Captured for top loads only
    pub anchor: Option<ScrollAnchor>,
}

impl LoadTicket {
    pub fn direction(&self) -> Direction {
        self.request.direction
    }
}

/// Host-supplied provider of the content around the loaded window
///
/// Implementations return the lines to splice in; the engine performs the
/// splice itself, so nothing is mutated when a call fails.
#[async_trait]
pub trait ContentSource: Send {
    /// Lines immediately before `request.first_line_number`, in file order.
    /// Empty when the window already starts at the beginning of the file.
    async fn load_before(&mut self, request: LoadRequest) -> anyhow::Result<Vec<String>>;

    /// Lines immediately after `request.last_line_number`, in file order.
    /// Empty at end of file.
    async fn load_after(&mut self, request: LoadRequest) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockState {
    Idle,
    Requesting { ticket: u64, since: Instant },
}

/// Per-edge request lock
#[derive(Debug, Clone, Copy)]
struct DirectionalLock {
    state: LockState,
}

impl DirectionalLock {
    fn new() -> Self {
        Self {
            state: LockState::Idle,
        }
    }

    fn is_locked(&self, now: Instant, timeout: Duration) -> bool {
        match self.state {
            LockState::Idle => false,
            LockState::Requesting { since, .. } => now.saturating_duration_since(since) < timeout,
        }
    }

    fn acquire(&mut self, ticket: u64, now: Instant) {
        self.state = LockState::Requesting { ticket, since: now };
    }

    /// Release only if `ticket` still holds the lock
    fn release(&mut self, ticket: u64) -> bool {
        match self.state {
            LockState::Requesting { ticket: held, .. } if held == ticket => {
                self.state = LockState::Idle;
                true
            }
            _ => false,
        }
    }
}

/// Scroll-driven trigger and lock state for both edges
#[derive(Debug, Clone)]
pub struct IncrementalLoader {
    config: LoaderConfig,
    top: DirectionalLock,
    bottom: DirectionalLock,
    last_scroll_top: Option<f64>,
    consecutive_up: u32,
    next_ticket: u64,
    session: u64,
}

impl IncrementalLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            top: DirectionalLock::new(),
            bottom: DirectionalLock::new(),
            last_scroll_top: None,
            consecutive_up: 0,
            next_ticket: 1,
            session: 0,
        }
    }

    fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.config.lock_timeout_ms)
    }

    fn lock(&self, direction: Direction) -> &DirectionalLock {
        match direction {
            Direction::Top => &self.top,
            Direction::Bottom => &self.bottom,
        }
    }

    fn lock_mut(&mut self, direction: Direction) -> &mut DirectionalLock {
        match direction {
            Direction::Top => &mut self.top,
            Direction::Bottom => &mut self.bottom,
        }
    }

    /// Whether a request in `direction` is outstanding and not timed out
    pub fn is_locked(&self, direction: Direction, now: Instant) -> bool {
        self.lock(direction).is_locked(now, self.lock_timeout())
    }

    /// Forget scroll history (after a file switch or programmatic jump)
    pub fn reset_scroll_tracking(&mut self) {
        self.last_scroll_top = None;
        self.consecutive_up = 0;
    }

    /// Drop all state, including outstanding locks
    ///
    /// Tickets issued before the reset are no longer current.
    pub fn reset(&mut self) {
        self.reset_scroll_tracking();
        self.top = DirectionalLock::new();
        self.bottom = DirectionalLock::new();
        self.session += 1;
    }

    /// Whether `ticket` was issued since the last reset
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.session == self.session
    }

    /// Feed a scroll event; returns the edge that should load, if any
    pub fn on_scroll(&mut self, event: &ScrollEvent, now: Instant) -> Option<Direction> {
        let delta = match self.last_scroll_top {
            Some(previous) => event.scroll_top - previous,
            None => 0.0,
        };
        self.last_scroll_top = Some(event.scroll_top);

        if delta.abs() < self.config.min_scroll_delta_px {
            return None;
        }

        if delta < 0.0 {
            self.consecutive_up = self.consecutive_up.saturating_add(1);
            let near_top = event.scroll_top <= self.config.top_threshold_px;
            if near_top
                && self.consecutive_up >= self.config.top_consecutive_events
                && !self.is_locked(Direction::Top, now)
            {
                self.consecutive_up = 0;
                tracing::debug!("Top load triggered at scroll_top={}", event.scroll_top);
                return Some(Direction::Top);
            }
        } else {
            self.consecutive_up = 0;
            let distance_to_bottom =
                event.content_height - (event.scroll_top + event.viewport_height);
            if distance_to_bottom <= self.config.bottom_threshold_px
                && !self.is_locked(Direction::Bottom, now)
            {
                tracing::debug!(
                    "Bottom load triggered, {}px from the end",
                    distance_to_bottom
                );
                return Some(Direction::Bottom);
            }
        }
        None
    }

    /// Issue a request for `direction`, taking its lock
    ///
    /// Returns `None` while a request in the same direction is outstanding.
    pub fn begin(
        &mut self,
        request: LoadRequest,
        anchor: Option<ScrollAnchor>,
        now: Instant,
    ) -> Option<LoadTicket> {
        let direction = request.direction;
        if self.is_locked(direction, now) {
            tracing::trace!("{} load rejected: request already in flight", direction);
            return None;
        }
        let id = self.next_ticket;
        self.next_ticket += 1;
        self.lock_mut(direction).acquire(id, now);
        Some(LoadTicket {
            id,
            session: self.session,
            request,
            anchor: anchor.filter(|_| direction == Direction::Top),
        })
    }

    /// Record a successful completion; returns the scroll correction for prepends
    pub fn complete(&mut self, ticket: &LoadTicket, lines_added: usize) -> Option<ScrollRestore> {
        let direction = ticket.direction();
        if !self.lock_mut(direction).release(ticket.id) {
            tracing::debug!(
                "{} load #{} completed after its lock expired",
                direction,
                ticket.id
            );
        }

        if lines_added == 0 {
            return None;
        }
        let anchor = ticket.anchor?;
        tracing::trace!(
            "Restoring anchor at line {} of {}, shifted by {}",
            anchor.original_index,
            anchor.line_count,
            lines_added
        );
        Some(ScrollRestore {
            visible_index: anchor.visible_index + lines_added,
            original_index: anchor.original_index + lines_added,
            pixel_offset: anchor.pixel_offset,
        })
    }

    /// Record a failed request
    ///
    /// The lock is left to expire, so the edge is retried on a later scroll
    /// once the timeout has passed.
    pub fn fail(&mut self, ticket: &LoadTicket, error: &anyhow::Error) {
        tracing::warn!(
            "{} load #{} failed: {:#}",
            ticket.direction(),
            ticket.id,
            error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: f64 = 400.0;
    const CONTENT: f64 = 10_000.0;

    fn event(scroll_top: f64) -> ScrollEvent {
        ScrollEvent {
            scroll_top,
            viewport_height: VIEWPORT,
            content_height: CONTENT,
        }
    }

    fn request(direction: Direction) -> LoadRequest {
        LoadRequest {
            direction,
            first_line_number: 100,
            last_line_number: 600,
            start_byte: 4_000,
            end_byte: 24_000,
        }
    }

    fn anchor(visible_index: usize) -> ScrollAnchor {
        ScrollAnchor {
            visible_index,
            original_index: visible_index,
            pixel_offset: 7.0,
            line_count: 500,
        }
    }

    #[test]
    fn test_small_upward_deltas_never_trigger() {
        let mut loader = IncrementalLoader::new(LoaderConfig::default());
        let now = Instant::now();
        assert_eq!(loader.on_scroll(&event(40.0), now), None);
        assert_eq!(loader.on_scroll(&event(37.0), now), None);
        assert_eq!(loader.on_scroll(&event(34.0), now), None);
        assert_eq!(loader.on_scroll(&event(31.0), now), None);
    }

    #[test]
    fn test_two_upward_events_near_top_trigger_once() {
        let mut loader = IncrementalLoader::new(LoaderConfig::default());
        let now = Instant::now();
        loader.on_scroll(&event(40.0), now);
        assert_eq!(loader.on_scroll(&event(30.0), now), None);
        assert_eq!(loader.on_scroll(&event(20.0), now), Some(Direction::Top));

        let ticket = loader.begin(request(Direction::Top), Some(anchor(3)), now);
        assert!(ticket.is_some());

        // Locked: further upward scrolling does not fire again
        assert_eq!(loader.on_scroll(&event(10.0), now), None);
        assert_eq!(loader.on_scroll(&event(0.0), now), None);
    }

    #[test]
    fn test_single_upward_bounce_does_not_trigger() {
        let mut loader = IncrementalLoader::new(LoaderConfig::default());
        let now = Instant::now();
        loader.on_scroll(&event(100.0), now);
        assert_eq!(loader.on_scroll(&event(110.0), now), None);
        assert_eq!(loader.on_scroll(&event(30.0), now), None);
        // Downward movement resets the upward count
        assert_eq!(loader.on_scroll(&event(40.0), now), None);
        assert_eq!(loader.on_scroll(&event(20.0), now), None);
    }

    #[test]
    fn test_upward_far_from_top_does_not_trigger() {
        let mut loader = IncrementalLoader::new(LoaderConfig::default());
        let now = Instant::now();
        loader.on_scroll(&event(500.0), now);
        assert_eq!(loader.on_scroll(&event(400.0), now), None);
        assert_eq!(loader.on_scroll(&event(300.0), now), None);
    }

    #[test]
    fn test_bottom_triggers_within_threshold() {
        let mut loader = IncrementalLoader::new(LoaderConfig::default());
        let now = Instant::now();
        let near_end = CONTENT - VIEWPORT - 150.0;
        loader.on_scroll(&event(near_end), now);
        assert_eq!(loader.on_scroll(&event(near_end + 10.0), now), None);
        assert_eq!(
            loader.on_scroll(&event(near_end + 60.0), now),
            Some(Direction::Bottom)
        );
    }

    #[test]
    fn test_lock_rejects_then_expires() {
        let config = LoaderConfig::default();
        let mut loader = IncrementalLoader::new(config.clone());
        let start = Instant::now();

        let first = loader.begin(request(Direction::Bottom), None, start).unwrap();
        assert!(loader.begin(request(Direction::Bottom), None, start).is_none());
        // The other edge is independent
        assert!(loader
            .begin(request(Direction::Top), Some(anchor(0)), start)
            .is_some());

        let later = start + Duration::from_millis(config.lock_timeout_ms);
        assert!(!loader.is_locked(Direction::Bottom, later));
        let second = loader.begin(request(Direction::Bottom), None, later).unwrap();

        // The stale completion must not unlock the newer request
        loader.complete(&first, 10);
        assert!(loader.is_locked(Direction::Bottom, later));
        loader.complete(&second, 10);
        assert!(!loader.is_locked(Direction::Bottom, later));
    }

    #[test]
    fn test_complete_top_restores_shifted_anchor() {
        let mut loader = IncrementalLoader::new(LoaderConfig::default());
        let now = Instant::now();
        let ticket = loader
            .begin(request(Direction::Top), Some(anchor(12)), now)
            .unwrap();
        let restore = loader.complete(&ticket, 250).unwrap();
        assert_eq!(restore.visible_index, 262);
        assert_eq!(restore.original_index, 262);
        assert_eq!(restore.pixel_offset, 7.0);
        assert!(!loader.is_locked(Direction::Top, now));
    }

    #[test]
    fn test_complete_without_new_lines_needs_no_restore() {
        let mut loader = IncrementalLoader::new(LoaderConfig::default());
        let now = Instant::now();
        let ticket = loader
            .begin(request(Direction::Top), Some(anchor(12)), now)
            .unwrap();
        assert_eq!(loader.complete(&ticket, 0), None);
    }

    #[test]
    fn test_bottom_ticket_drops_anchor() {
        let mut loader = IncrementalLoader::new(LoaderConfig::default());
        let ticket = loader
            .begin(request(Direction::Bottom), Some(anchor(1)), Instant::now())
            .unwrap();
        assert!(ticket.anchor.is_none());
        assert_eq!(loader.complete(&ticket, 40), None);
    }

    #[test]
    fn test_reset_retires_outstanding_tickets() {
        let mut loader = IncrementalLoader::new(LoaderConfig::default());
        let now = Instant::now();
        let ticket = loader.begin(request(Direction::Top), None, now).unwrap();
        assert!(loader.is_current(&ticket));

        loader.reset();
        assert!(!loader.is_current(&ticket));
        assert!(!loader.is_locked(Direction::Top, now));
        let fresh = loader.begin(request(Direction::Top), None, now).unwrap();
        assert!(loader.is_current(&fresh));
    }

    #[test]
    fn test_failure_keeps_lock_until_timeout() {
        let config = LoaderConfig::default();
        let mut loader = IncrementalLoader::new(config.clone());
        let start = Instant::now();
        let ticket = loader.begin(request(Direction::Top), None, start).unwrap();
        loader.fail(&ticket, &anyhow::anyhow!("connection reset"));
        assert!(loader.is_locked(Direction::Top, start));
        assert!(!loader.is_locked(
            Direction::Top,
            start + Duration::from_millis(config.lock_timeout_ms)
        ));
    }
}
