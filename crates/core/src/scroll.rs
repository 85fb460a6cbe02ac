//! Keeps the label grid and the timeline scrolled to the same row.
//!
//! The grid pane leads. Every grid scroll is mirrored onto the timeline at
//! once, and re-checked [`RESYNC_DELAY`] later in case the timeline could not
//! take the offset yet (e.g. its content was still being laid out).

use std::time::{Duration, Instant};

use tracing::debug;

/// Delay before the follow-up alignment check.
pub const RESYNC_DELAY: Duration = Duration::from_millis(100);

/// Vertical scroll position of one pane, clamped to its content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollPane {
    offset: usize,
    max_offset: usize,
}

impl ScrollPane {
    pub fn new(max_offset: usize) -> Self {
        Self {
            offset: 0,
            max_offset,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn max_offset(&self) -> usize {
        self.max_offset
    }

    /// Update the scrollable range, pulling the offset back inside it.
    pub fn set_max_offset(&mut self, max_offset: usize) {
        self.max_offset = max_offset;
        self.offset = self.offset.min(max_offset);
    }

    /// Move to `offset` (clamped). Returns the offset actually applied.
    pub fn scroll_to(&mut self, offset: usize) -> usize {
        self.offset = offset.min(self.max_offset);
        self.offset
    }
}

/// Mirrors grid scrolling onto the timeline with a delayed correction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollSync {
    recheck_at: Option<Instant>,
}

impl ScrollSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// The grid pane moved: copy its offset and schedule a re-check.
    pub fn on_grid_scroll(&mut self, grid: &ScrollPane, timeline: &mut ScrollPane, now: Instant) {
        timeline.scroll_to(grid.offset());
        self.recheck_at = Some(now + RESYNC_DELAY);
    }

    /// Whether a re-check is scheduled.
    pub fn is_pending(&self) -> bool {
        self.recheck_at.is_some()
    }

    /// Run the scheduled re-check if it is due. Returns true if the timeline moved.
    pub fn tick(&mut self, grid: &ScrollPane, timeline: &mut ScrollPane, now: Instant) -> bool {
        match self.recheck_at {
            Some(at) if now >= at => {
                self.recheck_at = None;
                if timeline.offset() != grid.offset() {
                    debug!(
                        grid = grid.offset(),
                        timeline = timeline.offset(),
                        "Panes drifted, forcing scroll"
                    );
                    timeline.scroll_to(grid.offset());
                    return true;
                }
                false
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_pane_clamps() {
        let mut pane = ScrollPane::new(10);
        assert_eq!(pane.scroll_to(25), 10);
        assert_eq!(pane.scroll_to(7), 7);

        pane.scroll_to(9);
        pane.set_max_offset(4);
        assert_eq!(pane.offset(), 4);
    }

    #[test]
    fn test_grid_scroll_is_mirrored() {
        let mut grid = ScrollPane::new(500);
        let mut timeline = ScrollPane::new(500);
        let mut sync = ScrollSync::new();

        grid.scroll_to(240);
        sync.on_grid_scroll(&grid, &mut timeline, Instant::now());
        assert_eq!(timeline.offset(), 240);
        assert!(sync.is_pending());
    }

    #[test]
    fn test_scroll_sync_converges_after_recheck() {
        let start = Instant::now();
        let mut grid = ScrollPane::new(500);
        // timeline content not laid out yet
        let mut timeline = ScrollPane::new(100);
        let mut sync = ScrollSync::new();

        grid.scroll_to(240);
        sync.on_grid_scroll(&grid, &mut timeline, start);
        assert_eq!(timeline.offset(), 100);

        timeline.set_max_offset(500);
        assert!(!sync.tick(&grid, &mut timeline, start + Duration::from_millis(50)));
        assert_eq!(timeline.offset(), 100);

        assert!(sync.tick(&grid, &mut timeline, start + RESYNC_DELAY));
        assert_eq!(timeline.offset(), 240);
        assert!(!sync.is_pending());
    }

    #[test]
    fn test_scroll_back_to_top_is_mirrored() {
        let mut grid = ScrollPane::new(500);
        let mut timeline = ScrollPane::new(500);
        let mut sync = ScrollSync::new();
        let now = Instant::now();

        grid.scroll_to(40);
        sync.on_grid_scroll(&grid, &mut timeline, now);
        grid.scroll_to(0);
        sync.on_grid_scroll(&grid, &mut timeline, now);
        assert_eq!(timeline.offset(), 0);
    }

    #[test]
    fn test_tick_without_drift_is_noop() {
        let mut grid = ScrollPane::new(10);
        let mut timeline = ScrollPane::new(10);
        let mut sync = ScrollSync::new();
        let now = Instant::now();

        assert!(!sync.tick(&grid, &mut timeline, now));
        grid.scroll_to(3);
        sync.on_grid_scroll(&grid, &mut timeline, now);
        assert!(!sync.tick(&grid, &mut timeline, now + RESYNC_DELAY));
    }
}
