//! Timeline geometry: where an instance's bars go and where ruler ticks sit.
//!
//! All positions are in abstract units (pixels in a browser, cells in a
//! terminal) measured from the left edge of the chart.

use std::ops::Range;

use chrono::{DateTime, Duration, Utc};

use crate::datetime::duration_ms;
use crate::models::{TaskInstance, TaskState};

/// Narrowest segment drawn, so zero-length instances stay visible.
pub const MIN_SEGMENT_WIDTH: f64 = 5.0;
/// Distance between ruler ticks.
pub const RULER_SPACING: f64 = 100.0;

/// A horizontal span of the chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub offset: f64,
    pub width: f64,
}

impl Segment {
    /// Right edge of the span.
    pub fn end(&self) -> f64 {
        self.offset + self.width
    }

    /// Whole cells covered by the span, clipped to `[0, width)`.
    ///
    /// Returns `None` when nothing of the span is on screen. A visible span
    /// always covers at least one cell.
    pub fn cells(&self, width: usize) -> Option<Range<usize>> {
        let start = self.offset.floor().max(0.0);
        let end = self.end().ceil();
        if end <= 0.0 || start >= width as f64 {
            return None;
        }
        let start = start as usize;
        Some(start..(end as usize).clamp(start + 1, width))
    }
}

/// Bars for one instance: an optional queued lead-in and the state bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemGeometry {
    /// Left edge of the whole item.
    pub offset: f64,
    pub queued: Option<Segment>,
    pub main: Segment,
}

/// A labelled ruler position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RulerTick {
    pub x: f64,
    pub time: DateTime<Utc>,
}

/// Ruler ticks plus the closing marker near the right edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruler {
    pub ticks: Vec<RulerTick>,
    pub end_marker: f64,
}

/// Maps instants in `[start, end]` onto `[0, width]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GanttScale {
    pub width: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub min_segment_width: f64,
    pub ruler_spacing: f64,
}

impl GanttScale {
    /// Create a scale with the default floor and ruler spacing.
    pub fn new(width: f64, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            width,
            start,
            end,
            min_segment_width: MIN_SEGMENT_WIDTH,
            ruler_spacing: RULER_SPACING,
        }
    }

    pub fn with_min_segment_width(mut self, min: f64) -> Self {
        self.min_segment_width = min;
        self
    }

    pub fn with_ruler_spacing(mut self, spacing: f64) -> Self {
        self.ruler_spacing = spacing;
        self
    }

    /// Window length in milliseconds.
    pub fn total_ms(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_milliseconds()
    }

    /// Width covered by `ms` of the window; 0 for an empty window.
    fn scaled(&self, ms: i64) -> f64 {
        let total = self.total_ms();
        if total <= 0 {
            return 0.0;
        }
        ms as f64 * self.width / total as f64
    }

    /// Horizontal position of an instant.
    pub fn x_for(&self, at: DateTime<Utc>) -> f64 {
        self.scaled(at.signed_duration_since(self.start).num_milliseconds())
    }

    /// Lay out one instance. Missing start or end times count as `now`.
    pub fn item_geometry(&self, instance: &TaskInstance, now: DateTime<Utc>) -> ItemGeometry {
        let valid_queued = instance.valid_queued_dttm();

        let task_ms = duration_ms(instance.start_date, instance.end_date, now);
        let offset_ms = duration_ms(
            Some(self.start),
            valid_queued.or(instance.start_date),
            now,
        );

        let offset = self.scaled(offset_ms);
        let main_width = self.scaled(task_ms).max(self.min_segment_width);

        let queued = match valid_queued {
            Some(queued_at) if instance.state != Some(TaskState::Queued) => {
                let queued_ms = duration_ms(Some(queued_at), instance.start_date, now);
                let width = self.scaled(queued_ms).max(self.min_segment_width);
                Some(Segment { offset, width })
            }
            _ => None,
        };

        let main_offset = queued.map_or(offset, |segment| segment.end());
        ItemGeometry {
            offset,
            queued,
            main: Segment {
                offset: main_offset,
                width: main_width,
            },
        }
    }

    /// Ticks every `ruler_spacing` units, `round(width / spacing)` of them.
    pub fn ruler(&self) -> Ruler {
        let num_bars = (self.width / self.ruler_spacing).round();
        let ticks = if num_bars >= 1.0 && num_bars.is_finite() {
            let bars = num_bars as i64;
            let interval_ms = self.total_ms() as f64 / num_bars;
            (0..bars)
                .map(|i| RulerTick {
                    x: self.width / num_bars * i as f64,
                    time: self.start + Duration::milliseconds((interval_ms * i as f64) as i64),
                })
                .collect()
        } else {
            Vec::new()
        };

        Ruler {
            ticks,
            end_marker: self.width - 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn instance(
        queued: Option<DateTime<Utc>>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        state: TaskState,
    ) -> TaskInstance {
        TaskInstance {
            dag_id: Some("etl".to_string()),
            run_id: "r1".to_string(),
            task_id: "t1".to_string(),
            map_index: None,
            try_number: 1,
            hostname: None,
            queued_dttm: queued,
            start_date: start,
            end_date: end,
            state: Some(state),
        }
    }

    #[test]
    fn test_segment_cells_clip_to_width() {
        let inside = Segment {
            offset: 2.4,
            width: 3.0,
        };
        assert_eq!(inside.cells(10), Some(2..6));

        let before = Segment {
            offset: -5.0,
            width: 2.0,
        };
        assert_eq!(before.cells(10), None);

        let overflowing = Segment {
            offset: 8.0,
            width: 10.0,
        };
        assert_eq!(overflowing.cells(10), Some(8..10));

        let sliver = Segment {
            offset: 3.0,
            width: 0.0,
        };
        assert_eq!(sliver.cells(10), Some(3..4));
    }

    #[test]
    fn test_queued_then_running_segments() {
        let scale = GanttScale::new(600.0, at(9, 0), at(10, 0));
        let ti = instance(
            Some(at(9, 0)),
            Some(at(9, 5)),
            Some(at(9, 15)),
            TaskState::Running,
        );
        let geometry = scale.item_geometry(&ti, at(12, 0));

        assert_eq!(geometry.offset, 0.0);
        assert_eq!(
            geometry.queued,
            Some(Segment {
                offset: 0.0,
                width: 50.0
            })
        );
        assert_eq!(
            geometry.main,
            Segment {
                offset: 50.0,
                width: 100.0
            }
        );
    }

    #[test]
    fn test_queued_state_skips_queued_segment() {
        let scale = GanttScale::new(600.0, at(9, 0), at(10, 0));
        let ti = instance(Some(at(9, 10)), None, None, TaskState::Queued);
        let geometry = scale.item_geometry(&ti, at(9, 30));

        assert!(geometry.queued.is_none());
        assert_eq!(geometry.main.offset, 100.0);
        assert_eq!(geometry.main.width, MIN_SEGMENT_WIDTH);
    }

    #[test]
    fn test_invalid_queued_time_ignored() {
        let scale = GanttScale::new(600.0, at(9, 0), at(10, 0));
        let ti = instance(
            Some(at(9, 20)),
            Some(at(9, 10)),
            Some(at(9, 20)),
            TaskState::Success,
        );
        let geometry = scale.item_geometry(&ti, at(12, 0));

        assert!(geometry.queued.is_none());
        assert_eq!(geometry.main.offset, 100.0);
        assert_eq!(geometry.main.width, 100.0);
    }

    #[test]
    fn test_min_width_floor() {
        let scale = GanttScale::new(600.0, at(9, 0), at(10, 0));
        let ti = instance(
            Some(at(9, 30)),
            Some(at(9, 30) + Duration::seconds(1)),
            Some(at(9, 30) + Duration::seconds(1)),
            TaskState::Success,
        );
        let geometry = scale.item_geometry(&ti, at(12, 0));

        assert_eq!(geometry.queued.map(|s| s.width), Some(MIN_SEGMENT_WIDTH));
        assert_eq!(geometry.main.width, MIN_SEGMENT_WIDTH);
    }

    #[test]
    fn test_running_instance_extends_to_now() {
        let scale = GanttScale::new(600.0, at(9, 0), at(10, 0));
        let ti = instance(None, Some(at(9, 0)), None, TaskState::Running);
        let geometry = scale.item_geometry(&ti, at(9, 30));
        assert_eq!(geometry.main.width, 300.0);
    }

    #[test]
    fn test_items_inside_window_stay_inside() {
        let scale = GanttScale::new(600.0, at(9, 0), at(10, 0));
        let now = at(12, 0);
        for (q, s, e) in [(0, 5, 15), (10, 30, 59), (45, 50, 60), (0, 0, 60)] {
            let ti = instance(
                Some(at(9, 0) + Duration::minutes(q)),
                Some(at(9, 0) + Duration::minutes(s)),
                Some(at(9, 0) + Duration::minutes(e)),
                TaskState::Success,
            );
            let geometry = scale.item_geometry(&ti, now);
            assert!(geometry.offset >= 0.0);
            assert!(geometry.main.end() <= 600.0 + MIN_SEGMENT_WIDTH + 1e-9);
        }
    }

    #[test]
    fn test_empty_window_has_no_division_by_zero() {
        let scale = GanttScale::new(600.0, at(9, 0), at(9, 0));
        let ti = instance(None, Some(at(9, 0)), Some(at(9, 30)), TaskState::Success);
        let geometry = scale.item_geometry(&ti, at(12, 0));
        assert_eq!(geometry.offset, 0.0);
        assert_eq!(geometry.main.width, MIN_SEGMENT_WIDTH);
        assert_eq!(scale.x_for(at(9, 30)), 0.0);
    }

    #[test]
    fn test_ruler_ticks() {
        let scale = GanttScale::new(600.0, at(9, 0), at(10, 0));
        let ruler = scale.ruler();
        assert_eq!(ruler.ticks.len(), 6);
        assert_eq!(ruler.ticks[1].x, 100.0);
        assert_eq!(ruler.ticks[1].time, at(9, 10));
        assert_eq!(ruler.ticks[5].time, at(9, 50));
        assert_eq!(ruler.end_marker, 598.0);
    }

    #[test]
    fn test_ruler_with_custom_spacing_and_narrow_width() {
        let scale = GanttScale::new(80.0, at(9, 0), at(10, 0)).with_ruler_spacing(20.0);
        assert_eq!(scale.ruler().ticks.len(), 4);

        let narrow = GanttScale::new(40.0, at(9, 0), at(10, 0));
        assert!(narrow.ruler().ticks.is_empty());
    }

    #[test]
    fn test_custom_min_segment_width() {
        let scale = GanttScale::new(60.0, at(9, 0), at(10, 0)).with_min_segment_width(1.0);
        let ti = instance(None, Some(at(9, 0)), Some(at(9, 0)), TaskState::Success);
        assert_eq!(scale.item_geometry(&ti, at(12, 0)).main.width, 1.0);
    }
}
