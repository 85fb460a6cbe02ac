//! Timeline pane: the ruler plus one bar line per visible row.
//!
//! Geometry comes from [`GanttScale`] in terminal cells. Each item draws an
//! optional queued lead-in (`░`, gray) followed by its state bar (`█`,
//! coloured by state). Ruler ticks continue down the pane as `┊` dividers.

use chrono::{DateTime, Utc};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use ganttview_core::DisplayTimezone;
use ganttview_core::geometry::{GanttScale, Ruler};
use ganttview_core::layout::{RowData, VisibleRow};
use ganttview_core::models::TaskState;

/// Narrowest bar in cells.
pub const MIN_SEGMENT_CELLS: f64 = 1.0;
/// Cells between ruler ticks.
pub const RULER_SPACING_CELLS: f64 = 20.0;
/// Ruler label format.
pub const RULER_FORMAT: &str = "%H:%M:%S %Z";

const QUEUED_CHAR: char = '\u{2591}'; // ░
const BAR_CHAR: char = '\u{2588}'; // █
const TICK_CHAR: char = '\u{250A}'; // ┊

/// Scale for a timeline `width` cells wide.
pub fn terminal_scale(width: u16, start: DateTime<Utc>, end: DateTime<Utc>) -> GanttScale {
    GanttScale::new(f64::from(width), start, end)
        .with_min_segment_width(MIN_SEGMENT_CELLS)
        .with_ruler_spacing(RULER_SPACING_CELLS)
}

/// Display colour of a task state; no status is drawn in plain gray.
pub fn state_color(state: Option<TaskState>) -> Color {
    match state {
        Some(TaskState::Success) => Color::Green,
        Some(TaskState::Running) => Color::LightGreen,
        Some(TaskState::Failed) => Color::Red,
        Some(TaskState::UpstreamFailed) => Color::Rgb(255, 165, 0),
        Some(TaskState::Skipped) => Color::LightMagenta,
        Some(TaskState::UpForRetry) => Color::Yellow,
        Some(TaskState::UpForReschedule) => Color::Cyan,
        Some(TaskState::Queued) => Color::Gray,
        Some(TaskState::Scheduled) => Color::LightYellow,
        Some(TaskState::Deferred) => Color::Magenta,
        Some(TaskState::Removed) => Color::LightRed,
        Some(TaskState::Restarting) => Color::LightMagenta,
        Some(TaskState::Unknown) | None => Color::DarkGray,
    }
}

/// Tick columns for a ruler, including the end marker.
fn tick_columns(ruler: &Ruler, width: usize) -> Vec<usize> {
    ruler
        .ticks
        .iter()
        .map(|tick| tick.x)
        .chain(std::iter::once(ruler.end_marker))
        .filter(|x| *x >= 0.0)
        .map(|x| x.round() as usize)
        .filter(|x| *x < width)
        .collect()
}

/// Join styled cells into spans of equal style.
fn cells_to_line(cells: Vec<(char, Style)>) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut run = String::new();
    let mut run_style = Style::default();

    for (c, style) in cells {
        if style != run_style && !run.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut run), run_style));
        }
        run_style = style;
        run.push(c);
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, run_style));
    }

    Line::from(spans)
}

/// Build the ruler line: a tick and time label every ruler spacing.
pub(crate) fn build_ruler_line(scale: &GanttScale, timezone: DisplayTimezone) -> Line<'static> {
    let width = scale.width.max(0.0) as usize;
    let label_style = Style::default().fg(Color::Gray);
    let tick_style = Style::default().fg(Color::DarkGray);
    let mut cells = vec![(' ', Style::default()); width];

    let ruler = scale.ruler();
    for tick in &ruler.ticks {
        let col = tick.x.round() as usize;
        if col >= width {
            continue;
        }
        cells[col] = (TICK_CHAR, tick_style);
        let label = timezone.format(tick.time, RULER_FORMAT);
        for (i, c) in label.chars().enumerate() {
            let pos = col + 1 + i;
            if pos >= width {
                break;
            }
            cells[pos] = (c, label_style);
        }
    }

    let end = ruler.end_marker.round();
    if end >= 0.0 && (end as usize) < width {
        cells[end as usize] = (TICK_CHAR, tick_style);
    }

    cells_to_line(cells)
}

/// Build one row's bars.
///
/// `cursor` is the index of the item under the keyboard cursor, if the
/// cursor is on this row. Items marked selected and the cursor item are
/// drawn reversed.
pub(crate) fn build_row_line(
    row: &RowData,
    scale: &GanttScale,
    now: DateTime<Utc>,
    cursor: Option<usize>,
    ticks: &[usize],
) -> Line<'static> {
    let width = scale.width.max(0.0) as usize;
    let mut cells = vec![(' ', Style::default()); width];

    for &col in ticks {
        if col < width {
            cells[col] = (TICK_CHAR, Style::default().fg(Color::DarkGray));
        }
    }

    for (index, item) in row.items.iter().enumerate() {
        let geometry = scale.item_geometry(&item.instance, now);
        let highlight = item.is_selected || cursor == Some(index);

        let mut queued_style = Style::default().fg(Color::DarkGray);
        let mut main_style = Style::default().fg(state_color(item.instance.state));
        if highlight {
            queued_style = queued_style.add_modifier(Modifier::REVERSED);
            main_style = main_style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
        }

        if let Some(queued) = geometry.queued
            && let Some(range) = queued.cells(width)
        {
            for cell in &mut cells[range] {
                *cell = (QUEUED_CHAR, queued_style);
            }
        }
        if let Some(range) = geometry.main.cells(width) {
            for cell in &mut cells[range] {
                *cell = (BAR_CHAR, main_style);
            }
        }
    }

    cells_to_line(cells)
}

/// What the timeline pane should show.
pub struct TimelineContent<'a> {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub rows: &'a [VisibleRow<'a>],
    /// Row and item index of the keyboard cursor.
    pub cursor: (usize, usize),
    /// Replaces the chart when set.
    pub message: Option<String>,
}

/// Render the timeline pane.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render within
/// * `content` - Window, rows and cursor to draw
/// * `timezone` - Timezone of the ruler labels
/// * `now` - Stand-in for missing start and end times
/// * `scroll_offset` - The timeline pane's vertical offset
pub fn render_timeline_view(
    frame: &mut Frame,
    area: Rect,
    content: &TimelineContent<'_>,
    timezone: DisplayTimezone,
    now: DateTime<Utc>,
    scroll_offset: usize,
) {
    let block = Block::default()
        .title(" Timeline ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if let Some(message) = &content.message {
        let paragraph = Paragraph::new(message.clone())
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
        return;
    }

    let inner_width = area.width.saturating_sub(2);
    let start = content.start_date.unwrap_or(now);
    let end = content.end_date.unwrap_or(now);
    let scale = terminal_scale(inner_width, start, end);

    let lines = build_timeline_lines(content, &scale, timezone, now, scroll_offset);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// All lines of the pane: the ruler, then rows from `scroll_offset` on.
pub(crate) fn build_timeline_lines(
    content: &TimelineContent<'_>,
    scale: &GanttScale,
    timezone: DisplayTimezone,
    now: DateTime<Utc>,
    scroll_offset: usize,
) -> Vec<Line<'static>> {
    let width = scale.width.max(0.0) as usize;
    let ticks = tick_columns(&scale.ruler(), width);
    let (cursor_row, cursor_item) = content.cursor;

    let mut lines = vec![build_ruler_line(scale, timezone)];
    lines.extend(
        content
            .rows
            .iter()
            .enumerate()
            .skip(scroll_offset)
            .map(|(i, visible)| {
                let cursor = (i == cursor_row).then_some(cursor_item);
                build_row_line(visible.row, scale, now, cursor, &ticks)
            }),
    );
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ganttview_core::layout::{RowItemData, TaskMeta, flatten_visible};
    use ganttview_core::models::TaskInstance;

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
            task_id: "load".to_string(),
            map_index: None,
            try_number: 1,
            hostname: None,
            queued_dttm: queued,
            start_date: start,
            end_date: end,
            state: Some(state),
        }
    }

    fn row_with(instance: TaskInstance, is_selected: bool) -> RowData {
        RowData {
            id: "load".to_string(),
            label: "load".to_string(),
            is_open: false,
            items: vec![RowItemData {
                is_selected,
                instance,
                task: TaskMeta {
                    id: "load".to_string(),
                    label: "load".to_string(),
                },
                link: None,
                title: None,
            }],
            children: Vec::new(),
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_state_color_palette() {
        assert_eq!(state_color(Some(TaskState::Success)), Color::Green);
        assert_eq!(state_color(Some(TaskState::Failed)), Color::Red);
        assert_eq!(state_color(Some(TaskState::Queued)), Color::Gray);
        assert_eq!(state_color(None), Color::DarkGray);
    }

    #[test]
    fn test_row_line_draws_queued_then_main() {
        // 10:00-12:00 across 120 cells: one cell per minute
        let scale = terminal_scale(120, at(10, 0), at(12, 0));
        let row = row_with(
            instance(
                Some(at(10, 10)),
                Some(at(10, 20)),
                Some(at(10, 50)),
                TaskState::Success,
            ),
            false,
        );

        let line = build_row_line(&row, &scale, at(12, 0), None, &[]);
        let chars: Vec<char> = text(&line).chars().collect();

        assert_eq!(chars.len(), 120);
        assert_eq!(chars[9], ' ');
        assert!(chars[10..20].iter().all(|c| *c == QUEUED_CHAR));
        assert!(chars[20..50].iter().all(|c| *c == BAR_CHAR));
        assert_eq!(chars[50], ' ');

        let bar = line
            .spans
            .iter()
            .find(|s| s.content.contains(BAR_CHAR))
            .unwrap();
        assert_eq!(bar.style.fg, Some(Color::Green));
    }

    #[test]
    fn test_queued_instance_has_no_lead_in() {
        let scale = terminal_scale(120, at(10, 0), at(12, 0));
        let row = row_with(
            instance(Some(at(10, 10)), None, None, TaskState::Queued),
            false,
        );

        let line = build_row_line(&row, &scale, at(10, 10), None, &[]);
        assert!(!text(&line).contains(QUEUED_CHAR));
        // zero-length bar still gets one cell
        assert_eq!(text(&line).matches(BAR_CHAR).count(), 1);
    }

    #[test]
    fn test_cursor_item_is_reversed() {
        let scale = terminal_scale(60, at(10, 0), at(11, 0));
        let row = row_with(
            instance(None, Some(at(10, 0)), Some(at(10, 30)), TaskState::Running),
            false,
        );

        let line = build_row_line(&row, &scale, at(11, 0), Some(0), &[]);
        let bar = line
            .spans
            .iter()
            .find(|s| s.content.contains(BAR_CHAR))
            .unwrap();
        assert!(bar.style.add_modifier.contains(Modifier::REVERSED));
    }

    #[test]
    fn test_ruler_line_labels_ticks() {
        let scale = terminal_scale(60, at(10, 0), at(13, 0));
        let line = build_ruler_line(&scale, DisplayTimezone::Utc);
        let rendered = text(&line);

        assert!(rendered.starts_with("\u{250A}10:00:00 UTC"));
        assert!(rendered.contains("\u{250A}11:00:00 UTC"));
        assert!(rendered.contains("\u{250A}12:00:00 UTC"));
        assert_eq!(rendered.chars().nth(58), Some(TICK_CHAR));
    }

    #[test]
    fn test_timeline_lines_skip_scrolled_rows() {
        let scale = terminal_scale(60, at(10, 0), at(11, 0));
        let rows: Vec<RowData> = (0..5)
            .map(|_| {
                row_with(
                    instance(None, Some(at(10, 0)), Some(at(10, 10)), TaskState::Success),
                    false,
                )
            })
            .collect();
        let visible = flatten_visible(&rows);
        let content = TimelineContent {
            start_date: Some(at(10, 0)),
            end_date: Some(at(11, 0)),
            rows: &visible,
            cursor: (0, 0),
            message: None,
        };

        let lines = build_timeline_lines(&content, &scale, DisplayTimezone::Utc, at(11, 0), 3);
        // ruler + rows 3 and 4
        assert_eq!(lines.len(), 3);
    }
}
