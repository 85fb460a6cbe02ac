//! Label grid: the left pane listing one caption per visible row.
//!
//! Group rows can be expanded and collapsed; the open set lives in
//! [`TreeState`] and feeds the row layout as its open group ids.

use std::collections::HashSet;

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use ganttview_core::layout::VisibleRow;

/// State for managing expanded groups in the task tree.
#[derive(Debug, Clone, Default)]
pub struct TreeState {
    /// Set of expanded group IDs.
    expanded: HashSet<String>,
}

impl TreeState {
    /// Create a new tree state with no groups expanded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a group is expanded.
    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Expand a group.
    pub fn expand(&mut self, id: impl Into<String>) {
        self.expanded.insert(id.into());
    }

    /// Collapse a group.
    pub fn collapse(&mut self, id: &str) {
        self.expanded.remove(id);
    }

    /// Toggle the expanded state of a group.
    pub fn toggle(&mut self, id: &str) {
        if self.is_expanded(id) {
            self.collapse(id);
        } else {
            self.expand(id.to_string());
        }
    }

    /// Collapse all groups.
    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// The expanded ids, as the layout builder expects them.
    pub fn expanded_ids(&self) -> &HashSet<String> {
        &self.expanded
    }

    /// The expanded ids in a stable order.
    pub fn sorted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.expanded.iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// Visual prefix characters for rows.
mod prefix {
    /// Prefix for collapsed group rows.
    pub const COLLAPSED: &str = "\u{25B8}"; // ▸
    /// Prefix for expanded group rows.
    pub const EXPANDED: &str = "\u{25BE}"; // ▾
    /// Prefix for leaf rows.
    pub const LEAF: &str = "\u{2022}"; // •
}

/// Render the label grid.
///
/// `scroll_offset` is the grid pane's offset; only rows from there on are
/// drawn so the pane lines up with the timeline.
pub fn render_label_grid(
    frame: &mut Frame,
    area: Rect,
    rows: &[VisibleRow<'_>],
    selected_row: usize,
    scroll_offset: usize,
    is_focused: bool,
) {
    let border_color = if is_focused {
        Color::Yellow
    } else {
        Color::Cyan
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    // blank line facing the timeline ruler
    let mut lines = vec![Line::from("")];
    lines.extend(
        rows.iter()
            .enumerate()
            .skip(scroll_offset)
            .map(|(i, row)| build_label_line(row, i == selected_row)),
    );

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Render a single row caption as a styled line.
pub(crate) fn build_label_line(visible: &VisibleRow<'_>, is_selected: bool) -> Line<'static> {
    let row = visible.row;
    let indent = "  ".repeat(visible.depth);

    let prefix = if row.has_children() {
        if row.is_open {
            prefix::EXPANDED
        } else {
            prefix::COLLAPSED
        }
    } else {
        prefix::LEAF
    };

    let text = format!("{}{} {}", indent, prefix, row.label);

    let style = if is_selected {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
            .bg(Color::DarkGray)
    } else if row.is_selected() {
        Style::default().fg(Color::LightBlue)
    } else if row.has_children() {
        Style::default().fg(Color::Magenta)
    } else {
        Style::default().fg(Color::White)
    };

    Line::from(Span::styled(text, style))
}
