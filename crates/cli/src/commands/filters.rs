//! Filters command
//!
//! Implements `gv filters`: resolves a query string into the window and run
//! limit a fetch would use, without contacting the backend.

use chrono::{DateTime, Utc};
use clap::Args;
use ganttview_core::{DisplayTimezone, FilterState};

use crate::output::format_filters;

/// Show the effective filters of a query string
#[derive(Debug, Args)]
pub struct FiltersCommand {
    /// Filter query string, e.g. "base_date=2024-01-01T10:00:00Z&time_range=2h"
    #[arg(default_value = "")]
    pub query: String,
}

impl FiltersCommand {
    /// Resolve the query and format the result.
    ///
    /// Unparseable values fall back to their defaults, so this never fails.
    pub fn execute(&self, timezone: DisplayTimezone, now: DateTime<Utc>) -> String {
        let state = FilterState::from_query_string(&self.query, now, timezone);
        format_filters(&state)
    }
}
