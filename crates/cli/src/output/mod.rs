//! Output formatting module for ganttview
//!
//! Provides table formatting and the plain-text gantt chart for CLI output.

use chrono::{DateTime, Utc};
use ganttview_core::api::ti_data_path;
use ganttview_core::datetime::{ISO_FORMAT_WITHOUT_TZ, duration_ms, format_duration};
use ganttview_core::geometry::Segment;
use ganttview_core::layout::flatten_visible;
use ganttview_core::models::state_label;
use ganttview_core::{DagRun, DisplayTimezone, FilterState, GanttLayout, GanttScale, TaskInstance};

/// Maximum width for the row label column of the chart
const MAX_LABEL_WIDTH: usize = 30;

/// Maximum width for the task column before truncation
const MAX_TASK_WIDTH: usize = 40;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RULER_FORMAT: &str = "%H:%M";

const QUEUED_CHAR: char = '.';
const BAR_CHAR: char = '#';
const SELECTED_CHAR: char = '@';
const TICK_CHAR: char = '|';

/// Columns between ruler ticks.
const RULER_SPACING_COLUMNS: f64 = 20.0;

/// Truncate a string to the specified maximum width, adding ellipsis if needed.
fn truncate(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let head: String = s.chars().take(max_width - 3).collect();
        format!("{}...", head)
    }
}

fn format_time(dt: Option<DateTime<Utc>>, timezone: DisplayTimezone) -> String {
    dt.map_or_else(|| "-".to_string(), |dt| timezone.format(dt, TIME_FORMAT))
}

fn format_warnings(warnings: &[String]) -> String {
    warnings
        .iter()
        .map(|w| format!("warning: {}\n", w))
        .collect()
}

/// Format the effective filters of a filter state.
///
/// ```text
/// End date:    2024-01-01T10:00:00 (utc)
/// Start date:  2024-01-01T08:00:00 (utc)
/// Time range:  2h
/// Max nr runs: 200
/// Query:       base_date=2024-01-01T10%3A00%3A00Z&time_range=2h
/// Fetch path:  object/ti_data?startDate=...
/// ```
pub fn format_filters(state: &FilterState) -> String {
    let filters = state.filters();
    let tz = state.timezone();
    let query = state.to_query_string();

    [
        format!(
            "End date:    {} ({})",
            tz.format(filters.end_date, ISO_FORMAT_WITHOUT_TZ),
            tz
        ),
        format!(
            "Start date:  {} ({})",
            tz.format(filters.start_date, ISO_FORMAT_WITHOUT_TZ),
            tz
        ),
        format!("Time range:  {}", filters.time_range),
        format!("Max nr runs: {}", filters.num_runs),
        format!("Query:       {}", if query.is_empty() { "-" } else { &query }),
        format!("Fetch path:  {}", ti_data_path(&filters.fetch_filters())),
    ]
    .join("\n")
}

/// Format task instances into an aligned table string, warnings first.
///
/// Produces output in the format:
/// ```text
/// Host      Dag  Task  Run  Try  State    Started              Duration
/// --------  ---  ----  ---  ---  -------  -------------------  --------
/// worker-1  etl  load  r1   1    success  2024-01-01 09:00:00  00:30:00
/// ```
///
/// # Arguments
///
/// * `tis` - Task instances to list
/// * `warnings` - Backend warnings, printed above the table
/// * `timezone` - Timezone for the start column
/// * `now` - End of still-running instances
pub fn format_ti_table(
    tis: &[&TaskInstance],
    warnings: &[String],
    timezone: DisplayTimezone,
    now: DateTime<Utc>,
) -> String {
    let mut output = format_warnings(warnings);
    if tis.is_empty() {
        output.push_str("No task instances found.");
        return output;
    }

    let headers = [
        "Host", "Dag", "Task", "Run", "Try", "State", "Started", "Duration",
    ];

    let rows: Vec<[String; 8]> = tis
        .iter()
        .map(|ti| {
            let duration = match ti.start_date {
                Some(_) => format_duration(duration_ms(ti.start_date, ti.end_date, now)),
                None => "-".to_string(),
            };
            [
                ti.hostname.clone().unwrap_or_else(|| "-".to_string()),
                ti.dag_id.clone().unwrap_or_else(|| "-".to_string()),
                truncate(&ti.task_id, MAX_TASK_WIDTH),
                ti.run_id.clone(),
                ti.try_number.to_string(),
                state_label(ti.state).to_string(),
                format_time(ti.start_date, timezone),
                duration,
            ]
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .max()
                .unwrap_or(0)
                .max(header.len())
        })
        .collect();

    let format_line = |cells: &[&str]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_line(&headers)];
    let separators: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    lines.push(format_line(
        &separators.iter().map(String::as_str).collect::<Vec<_>>(),
    ));
    for row in &rows {
        lines.push(format_line(
            &row.iter().map(String::as_str).collect::<Vec<_>>(),
        ));
    }

    output.push_str(&lines.join("\n"));
    output
}

/// Format a message followed by the dag runs to choose from.
pub fn format_run_list(message: &str, runs: &[DagRun], timezone: DisplayTimezone) -> String {
    let mut output = format!("{}\n\n", message);
    if runs.is_empty() {
        output.push_str("No dag runs found.");
        return output;
    }

    let run_width = runs
        .iter()
        .map(|r| r.run_id.len())
        .max()
        .unwrap_or(0)
        .max("Run".len());
    let state_width = runs
        .iter()
        .map(|r| r.state.as_deref().map_or(1, str::len))
        .max()
        .unwrap_or(0)
        .max("State".len());

    output.push_str(&format!(
        "{:<run_w$}  {:<state_w$}  Started\n",
        "Run",
        "State",
        run_w = run_width,
        state_w = state_width,
    ));
    output.push_str(&format!(
        "{:->run_w$}  {:->state_w$}  {:->19}\n",
        "",
        "",
        "",
        run_w = run_width,
        state_w = state_width,
    ));
    for run in runs {
        output.push_str(&format!(
            "{:<run_w$}  {:<state_w$}  {}\n",
            run.run_id,
            run.state.as_deref().unwrap_or("-"),
            format_time(run.start_date, timezone),
            run_w = run_width,
            state_w = state_width,
        ));
    }

    // Remove trailing newline
    output.pop();

    output
}

fn fill(cells: &mut [char], segment: &Segment, c: char) {
    if let Some(range) = segment.cells(cells.len()) {
        cells[range].fill(c);
    }
}

/// Ruler text: a tick and time label every [`RULER_SPACING_COLUMNS`].
fn ruler_text(scale: &GanttScale, timezone: DisplayTimezone, width: usize) -> String {
    let mut cells = vec![' '; width];
    let ruler = scale.ruler();

    for tick in &ruler.ticks {
        let col = tick.x.round() as usize;
        if col >= width {
            continue;
        }
        cells[col] = TICK_CHAR;
        let label = timezone.format(tick.time, RULER_FORMAT);
        for (i, c) in label.chars().enumerate() {
            if let Some(cell) = cells.get_mut(col + 1 + i) {
                *cell = c;
            }
        }
    }
    if ruler.end_marker >= 0.0
        && let Some(cell) = cells.get_mut(ruler.end_marker.round() as usize)
    {
        *cell = TICK_CHAR;
    }

    cells.into_iter().collect::<String>().trim_end().to_string()
}

/// Draw a layout as a plain-text gantt chart.
///
/// Queued lead-ins are drawn with `.`, state bars with `#` (`@` when
/// selected). Items partly outside the window are clipped.
///
/// # Arguments
///
/// * `layout` - Rows and window; a missing window bound falls back to `now`
/// * `warnings` - Backend warnings, printed above the chart
/// * `width` - Columns of the bar area
/// * `timezone` - Timezone of the ruler labels
/// * `now` - End of still-running instances
pub fn format_gantt(
    layout: &GanttLayout,
    warnings: &[String],
    width: u16,
    timezone: DisplayTimezone,
    now: DateTime<Utc>,
) -> String {
    let mut output = format_warnings(warnings);
    let visible = flatten_visible(&layout.rows);
    if visible.is_empty() {
        output.push_str("No task instances found.");
        return output;
    }

    let start = layout.start_date.unwrap_or(now);
    let end = layout.end_date.unwrap_or(now);
    let columns = usize::from(width);
    let scale = GanttScale::new(f64::from(width), start, end)
        .with_min_segment_width(1.0)
        .with_ruler_spacing(RULER_SPACING_COLUMNS);

    let labels: Vec<String> = visible
        .iter()
        .map(|v| format!("{}{}", "  ".repeat(v.depth), v.row.label))
        .collect();
    let label_width = labels
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .min(MAX_LABEL_WIDTH);

    let mut lines = vec![format!(
        "{:<label_w$} {}",
        "",
        ruler_text(&scale, timezone, columns),
        label_w = label_width,
    )];

    for (v, label) in visible.iter().zip(&labels) {
        let mut cells = vec![' '; columns];
        for item in &v.row.items {
            let geometry = scale.item_geometry(&item.instance, now);
            if let Some(queued) = &geometry.queued {
                fill(&mut cells, queued, QUEUED_CHAR);
            }
            let bar = if item.is_selected {
                SELECTED_CHAR
            } else {
                BAR_CHAR
            };
            fill(&mut cells, &geometry.main, bar);
        }
        let bars: String = cells.into_iter().collect();
        lines.push(
            format!(
                "{:<label_w$} {}",
                truncate(label, label_width),
                bars,
                label_w = label_width,
            )
            .trim_end()
            .to_string(),
        );
    }

    output.push_str(&lines.join("\n"));
    output
}
