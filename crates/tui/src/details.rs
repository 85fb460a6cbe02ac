//! Details strip: the tooltip for the item under the cursor.

use chrono::{DateTime, Utc};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use ganttview_core::DisplayTimezone;
use ganttview_core::datetime::{duration_ms, format_duration};
use ganttview_core::layout::RowItemData;
use ganttview_core::models::state_label;

use crate::timeline::state_color;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

fn field(name: &str) -> Span<'static> {
    Span::styled(format!("{}: ", name), Style::default().fg(Color::DarkGray))
}

fn format_time(dt: Option<DateTime<Utc>>, timezone: DisplayTimezone) -> String {
    dt.map_or_else(|| "-".to_string(), |dt| timezone.format(dt, TIME_FORMAT))
}

/// Build the tooltip lines for one item.
pub(crate) fn build_tooltip_lines(
    item: &RowItemData,
    timezone: DisplayTimezone,
    now: DateTime<Utc>,
) -> Vec<Line<'static>> {
    let ti = &item.instance;
    let heading = item.title.clone().unwrap_or_else(|| item.task.label.clone());

    let mut first = vec![
        Span::styled(
            heading,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            format!("[{}]", state_label(ti.state)),
            Style::default().fg(state_color(ti.state)),
        ),
        Span::raw("  "),
        field("Run"),
        Span::raw(ti.run_id.clone()),
        Span::raw("  "),
        field("Try"),
        Span::raw(ti.try_number.to_string()),
    ];
    if let Some(map_index) = ti.map_index {
        first.push(Span::raw("  "));
        first.push(field("Map index"));
        first.push(Span::raw(map_index.to_string()));
    }
    if let Some(host) = &ti.hostname {
        first.push(Span::raw("  "));
        first.push(field("Host"));
        first.push(Span::raw(host.clone()));
    }

    let mut second = Vec::new();
    if let Some(queued) = ti.queued_dttm {
        second.push(field("Queued"));
        second.push(Span::raw(format_time(Some(queued), timezone)));
        second.push(Span::raw("  "));
    }
    second.extend([
        field("Started"),
        Span::raw(format_time(ti.start_date, timezone)),
        Span::raw("  "),
        field("Ended"),
        Span::raw(format_time(ti.end_date, timezone)),
    ]);
    if ti.start_date.is_some() {
        second.push(Span::raw("  "));
        second.push(field("Duration"));
        second.push(Span::raw(format_duration(duration_ms(
            ti.start_date,
            ti.end_date,
            now,
        ))));
    }

    let mut lines = vec![Line::from(first), Line::from(second)];
    if let Some(link) = &item.link {
        lines.push(Line::from(vec![
            field("Link"),
            Span::styled(link.href(), Style::default().fg(Color::Blue)),
        ]));
    }
    lines
}

/// Render the details strip.
///
/// If `item` is `None`, displays a hint instead.
pub fn render_details_view(
    frame: &mut Frame,
    area: Rect,
    item: Option<&RowItemData>,
    timezone: DisplayTimezone,
    now: DateTime<Utc>,
) {
    let block = Block::default()
        .title(" Details ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    match item {
        Some(item) => {
            let paragraph = Paragraph::new(build_tooltip_lines(item, timezone, now)).block(block);
            frame.render_widget(paragraph, area);
        }
        None => {
            let paragraph = Paragraph::new("No task instance under the cursor")
                .block(block)
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(paragraph, area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ganttview_core::layout::{GridLink, TaskMeta};
    use ganttview_core::models::{TaskInstance, TaskState};

    fn item() -> RowItemData {
        RowItemData {
            is_selected: false,
            instance: TaskInstance {
                dag_id: Some("etl".to_string()),
                run_id: "scheduled__2024-01-01".to_string(),
                task_id: "load".to_string(),
                map_index: Some(3),
                try_number: 2,
                hostname: Some("worker-1".to_string()),
                queued_dttm: Some(Utc.with_ymd_and_hms(2024, 1, 1, 9, 55, 0).unwrap()),
                start_date: Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()),
                end_date: None,
                state: Some(TaskState::Running),
            },
            task: TaskMeta {
                id: "load".to_string(),
                label: "etl _ load".to_string(),
            },
            link: Some(GridLink {
                dag_id: "etl".to_string(),
                run_id: "scheduled__2024-01-01".to_string(),
                task_id: "load".to_string(),
            }),
            title: Some("etl load".to_string()),
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_tooltip_lists_instance_fields() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 1, 30).unwrap();
        let lines = build_tooltip_lines(&item(), DisplayTimezone::Utc, now);

        assert_eq!(lines.len(), 3);
        let first = text(&lines[0]);
        assert!(first.starts_with("etl load  [running]"));
        assert!(first.contains("Try: 2"));
        assert!(first.contains("Map index: 3"));
        assert!(first.contains("Host: worker-1"));

        let second = text(&lines[1]);
        assert!(second.contains("Queued: 2024-01-01 09:55:00 UTC"));
        assert!(second.contains("Ended: -"));
        // running: duration measured up to now
        assert!(second.contains("Duration: 00:01:30"));

        assert!(text(&lines[2]).contains("dags/etl/grid?dag_run_id="));
    }

    #[test]
    fn test_tooltip_without_title_uses_task_label() {
        let mut item = item();
        item.title = None;
        item.link = None;
        item.instance.state = None;
        let lines = build_tooltip_lines(&item, DisplayTimezone::Utc, Utc::now());

        assert_eq!(lines.len(), 2);
        assert!(text(&lines[0]).starts_with("etl _ load  [no_status]"));
    }
}
