//! Task instance listing
//!
//! Implements `gv ti-data`: fetches the task instances of the filter window
//! and prints them as a table or as JSON.

use clap::Args;
use ganttview_core::{FilterState, TaskInstance};
use serde::Serialize;
use tracing::debug;

use super::Context;
use crate::error::CliResult;
use crate::output::format_ti_table;

/// Fetch and list the task instances in the filter window
#[derive(Debug, Args)]
pub struct TiDataCommand {
    /// Filter query string, e.g. "time_range=2h&num_runs=25"
    #[arg(default_value = "")]
    pub query: String,

    /// Only instances that ran on this host
    #[arg(long)]
    pub host: Option<String>,

    /// Print task instances and warnings as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    tis: Vec<&'a TaskInstance>,
    warnings: &'a [String],
}

impl TiDataCommand {
    /// Execute the ti-data command.
    ///
    /// # Errors
    ///
    /// Returns `CliError` if the request fails or JSON encoding fails. An
    /// empty or unreadable payload is not an error: it comes back as a warning.
    pub async fn execute(&self, ctx: &Context) -> CliResult<String> {
        let state = FilterState::from_query_string(&self.query, ctx.now, ctx.timezone);
        let fetch = state.filters().fetch_filters();
        debug!(query = %fetch.to_query_string(), "Fetching task instances");

        let result = ctx.client.fetch_filtered(&fetch).await?;
        let tis: Vec<&TaskInstance> = result
            .tis
            .iter()
            .filter(|ti| match &self.host {
                Some(host) => ti.hostname.as_deref() == Some(host.as_str()),
                None => true,
            })
            .collect();

        if self.json {
            let output = JsonOutput {
                tis,
                warnings: &result.warnings,
            };
            return Ok(serde_json::to_string_pretty(&output)?);
        }

        Ok(format_ti_table(&tis, &result.warnings, ctx.timezone, ctx.now))
    }
}
