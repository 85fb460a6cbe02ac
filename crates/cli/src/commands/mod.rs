//! CLI commands for ganttview
//!
//! This module contains all subcommand implementations for the gv CLI.

pub mod filters;
pub mod gantt;
pub mod ti_data;

pub use filters::FiltersCommand;
pub use gantt::GanttCommand;
pub use ti_data::TiDataCommand;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use ganttview_core::{ApiClient, DisplayTimezone};

use crate::error::CliResult;

/// What every command runs against.
pub struct Context {
    pub client: ApiClient,
    pub timezone: DisplayTimezone,
    /// Reference time for default windows and running durations.
    pub now: DateTime<Utc>,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the effective filters of a query string
    Filters(FiltersCommand),
    /// Fetch and list the task instances in the filter window
    TiData(TiDataCommand),
    /// Draw a text gantt chart of the window or of one dag run
    Gantt(GanttCommand),
}

impl Command {
    /// Execute the command and return its output.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Backend client, display timezone and reference time
    ///
    /// # Errors
    ///
    /// Returns `CliError` if a backend request fails or arguments conflict.
    pub async fn execute(&self, ctx: &Context) -> CliResult<String> {
        match self {
            Command::Filters(cmd) => Ok(cmd.execute(ctx.timezone, ctx.now)),
            Command::TiData(cmd) => cmd.execute(ctx).await,
            Command::Gantt(cmd) => cmd.execute(ctx).await,
        }
    }
}
