//! Filter bar: end date, time range, run limit and the loading indicator.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use ganttview_core::DisplayTimezone;
use ganttview_core::datetime::ISO_FORMAT_WITHOUT_TZ;
use ganttview_core::filters::Filters;

/// Everything the filter bar shows.
pub struct FilterBarState<'a> {
    pub filters: &'a Filters,
    pub timezone: DisplayTimezone,
    /// A fetch or debounce is pending.
    pub loading: bool,
    /// Text typed so far while editing the end date.
    pub input: Option<&'a str>,
}

fn label(text: &str) -> Span<'static> {
    Span::styled(text.to_string(), Style::default().fg(Color::DarkGray))
}

fn value(text: String) -> Span<'static> {
    Span::styled(
        text,
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )
}

/// Build the single content line of the bar.
pub(crate) fn build_filter_line(state: &FilterBarState<'_>) -> Line<'static> {
    let mut spans = vec![label("End date: ")];

    match state.input {
        Some(input) => {
            spans.push(Span::styled(
                format!("{}_", input),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        None => {
            let end = state
                .timezone
                .format(state.filters.end_date, ISO_FORMAT_WITHOUT_TZ);
            spans.push(value(end));
        }
    }

    spans.push(label(format!(" ({})", state.timezone).as_str()));
    spans.push(label("   Time range: "));
    spans.push(value(state.filters.time_range.clone()));
    spans.push(label("   Max nr runs: "));
    spans.push(value(state.filters.num_runs.to_string()));

    if state.loading {
        spans.push(Span::styled(
            "   Loading...".to_string(),
            Style::default().fg(Color::Yellow),
        ));
    }

    Line::from(spans)
}

/// Render the filter bar.
pub fn render_filter_bar(frame: &mut Frame, area: Rect, state: &FilterBarState<'_>, title: &str) {
    let border_color = if state.input.is_some() {
        Color::Yellow
    } else {
        Color::Cyan
    };

    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let paragraph = Paragraph::new(build_filter_line(state)).block(block);
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn filters() -> Filters {
        Filters {
            start_date: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            num_runs: 200,
            time_range: "2h".to_string(),
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_filter_line_shows_values() {
        let filters = filters();
        let line = build_filter_line(&FilterBarState {
            filters: &filters,
            timezone: DisplayTimezone::Utc,
            loading: false,
            input: None,
        });
        let rendered = text(&line);

        assert!(rendered.contains("End date: 2024-01-01T10:00:00 (utc)"));
        assert!(rendered.contains("Time range: 2h"));
        assert!(rendered.contains("Max nr runs: 200"));
        assert!(!rendered.contains("Loading"));
    }

    #[test]
    fn test_filter_line_shows_loading_and_input() {
        let filters = filters();
        let line = build_filter_line(&FilterBarState {
            filters: &filters,
            timezone: DisplayTimezone::Utc,
            loading: true,
            input: Some("2024-02"),
        });
        let rendered = text(&line);

        assert!(rendered.contains("End date: 2024-02_"));
        assert!(rendered.contains("Loading..."));
    }
}
