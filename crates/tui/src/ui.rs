//! UI rendering for the TUI.
//!
//! Provides layout and widget rendering using ratatui.

use chrono::Utc;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use ganttview_core::api::{GridDataSource, TaskInstanceSource};
use ganttview_core::layout::{VisibleRow, flatten_visible};

use crate::app::{App, View};
use crate::details::render_details_view;
use crate::filter_bar::{FilterBarState, render_filter_bar};
use crate::navigation::render_label_grid;
use crate::timeline::{TimelineContent, render_timeline_view};

/// Width of the label grid, borders included.
pub const LABEL_WIDTH: u16 = 32;

const FILTER_BAR_HEIGHT: u16 = 3;
const DETAILS_HEIGHT: u16 = 5;
/// Warnings beyond this many are not shown.
const MAX_ALERT_LINES: usize = 3;

/// Legend text for keyboard shortcuts.
const LEGEND: &str = " [j/k] Row  [h/l] Item  [Enter] Open  [Tab] View  [[/]] ±2h  [{/}] ±8h  [n] Now  [b] End date  [t/T] Range  [r/R] Runs  [,/.] Run  [x] Dismiss  [F5] Refresh  [q] Quit ";

/// Screen regions, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenLayout {
    pub filter_bar: Rect,
    pub alerts: Rect,
    pub grid: Rect,
    pub timeline: Rect,
    pub details: Rect,
    pub legend: Rect,
}

/// Split the screen, reserving one line per shown warning.
pub fn screen_layout(area: Rect, alert_count: usize) -> ScreenLayout {
    let alert_lines = alert_count.min(MAX_ALERT_LINES) as u16;

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(FILTER_BAR_HEIGHT),
            Constraint::Length(alert_lines),
            Constraint::Min(0),
            Constraint::Length(DETAILS_HEIGHT),
            Constraint::Length(1),
        ])
        .split(area);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(LABEL_WIDTH), Constraint::Min(0)])
        .split(rows[2]);

    ScreenLayout {
        filter_bar: rows[0],
        alerts: rows[1],
        grid: main[0],
        timeline: main[1],
        details: rows[3],
        legend: rows[4],
    }
}

/// Chart rows that fit between the pane borders, below the ruler line.
pub fn chart_viewport_rows(area: Rect, alert_count: usize) -> usize {
    let layout = screen_layout(area, alert_count);
    layout.timeline.height.saturating_sub(3) as usize
}

/// Draw the entire UI.
pub fn draw<S: TaskInstanceSource + GridDataSource + 'static>(frame: &mut Frame, app: &App<S>) {
    let now = Utc::now();
    let warnings = app.visible_warnings();
    let regions = screen_layout(frame.area(), warnings.len());
    let timezone = app.timezone();

    let filters = app.filters();
    render_filter_bar(
        frame,
        regions.filter_bar,
        &FilterBarState {
            filters: &filters,
            timezone,
            loading: app.is_loading(),
            input: app.input(),
        },
        &app.view_title(),
    );

    draw_alerts(frame, regions.alerts, &warnings);

    let layout = app.gantt_layout();
    let visible = flatten_visible(&layout.rows);
    let message = app.chart_message();

    let grid_rows: &[VisibleRow<'_>] = if message.is_some() { &[] } else { &visible };
    render_label_grid(
        frame,
        regions.grid,
        grid_rows,
        app.selected_row(),
        app.grid_offset(),
        app.input().is_none(),
    );

    render_timeline_view(
        frame,
        regions.timeline,
        &TimelineContent {
            start_date: layout.start_date,
            end_date: layout.end_date,
            rows: &visible,
            cursor: (app.selected_row(), app.selected_item()),
            message,
        },
        timezone,
        now,
        app.timeline_offset(),
    );

    let item = visible
        .get(app.selected_row())
        .and_then(|v| v.row.items.get(app.selected_item()));
    render_details_view(frame, regions.details, item, timezone, now);

    draw_legend(frame, regions.legend, app.view());
}

fn draw_alerts(frame: &mut Frame, area: Rect, warnings: &[String]) {
    if area.height == 0 {
        return;
    }
    let lines: Vec<Line> = warnings
        .iter()
        .take(area.height as usize)
        .map(|w| {
            Line::from(vec![
                Span::styled(
                    " \u{2716} ",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::styled(w.clone(), Style::default().fg(Color::Red)),
                Span::styled("  [x] dismiss", Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), area);
}

/// Draw the legend bar at the bottom.
fn draw_legend(frame: &mut Frame, area: Rect, view: View) {
    let text = match view {
        View::Cluster => LEGEND.to_string(),
        View::Dag => format!(" [Esc] Back  [c] Collapse{}", LEGEND),
    };
    let legend = Paragraph::new(text).style(Style::default().fg(Color::Black).bg(Color::Cyan));

    frame.render_widget(legend, area);
}
