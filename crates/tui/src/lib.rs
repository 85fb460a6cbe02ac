//! TUI module for ganttview
//!
//! Draws the gantt timeline in the terminal using ratatui and crossterm:
//! a filter bar, the label grid beside the timeline, and a details strip
//! for the task instance under the cursor.

pub mod app;
pub mod details;
pub mod error;
pub mod event;
pub mod filter_bar;
pub mod navigation;
pub mod timeline;
pub mod ui;

pub use app::{App, AppOptions, View};
pub use error::{TuiError, TuiResult};
pub use navigation::{TreeState, render_label_grid};
