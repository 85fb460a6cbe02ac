//! Text gantt chart
//!
//! Implements `gv gantt`. Without `--dag-id` the chart has one row per
//! worker host over the filter window; with it, one row per task of the
//! chosen dag run, every group expanded.

use std::collections::HashSet;

use clap::Args;
use ganttview_core::api::GridDataSource;
use ganttview_core::layout::{SELECT_RUN_MESSAGE, host_rows, selection_to_row_data};
use ganttview_core::{FilterState, GanttLayout, Selection, Task};
use tracing::debug;

use super::Context;
use crate::error::{CliError, CliResult};
use crate::output::{format_gantt, format_run_list};

/// Draw a text gantt chart of the window or of one dag run
#[derive(Debug, Args)]
pub struct GanttCommand {
    /// Filter query string, e.g. "base_date=2024-01-01T10:00:00Z&time_range=2h"
    #[arg(default_value = "")]
    pub query: String,

    /// Chart the tasks of this dag instead of the worker hosts
    #[arg(long)]
    pub dag_id: Option<String>,

    /// Dag run to chart
    #[arg(long, requires = "dag_id")]
    pub run_id: Option<String>,

    /// Task to highlight within the run
    #[arg(long, requires = "run_id")]
    pub task_id: Option<String>,

    /// Width of the bar area in columns
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u16).range(20..))]
    pub width: u16,
}

/// Ids of every task group in the tree.
fn group_ids(task: &Task, ids: &mut HashSet<String>) {
    if task.is_group() {
        ids.insert(task.id.clone());
    }
    for child in &task.children {
        group_ids(child, ids);
    }
}

impl GanttCommand {
    /// Execute the gantt command.
    ///
    /// With a dag but no run, lists the dag's runs instead of a chart.
    ///
    /// # Errors
    ///
    /// Returns `CliError` if a request fails or the run does not belong to the dag.
    pub async fn execute(&self, ctx: &Context) -> CliResult<String> {
        let state = FilterState::from_query_string(&self.query, ctx.now, ctx.timezone);
        let filters = state.filters();

        let (layout, warnings) = match &self.dag_id {
            None => {
                let result = ctx.client.fetch_filtered(&filters.fetch_filters()).await?;
                let layout = GanttLayout {
                    start_date: Some(filters.start_date),
                    end_date: Some(filters.end_date),
                    rows: host_rows(&result.tis),
                };
                (layout, result.warnings)
            }
            Some(dag_id) => {
                let grid = ctx.client.fetch_grid_data(dag_id, filters.num_runs).await?;

                let Some(run_id) = &self.run_id else {
                    return Ok(format_run_list(
                        SELECT_RUN_MESSAGE,
                        &grid.dag_runs,
                        ctx.timezone,
                    ));
                };
                if !grid.dag_runs.iter().any(|run| &run.run_id == run_id) {
                    return Err(CliError::InvalidArgument {
                        message: format!("Run '{}' not found for dag '{}'", run_id, dag_id),
                    });
                }

                let mut selection = Selection::run(run_id.clone());
                if let Some(task_id) = &self.task_id {
                    selection = selection.with_task(task_id.clone());
                }

                let mut open = HashSet::new();
                group_ids(&grid.groups, &mut open);
                debug!(dag_id = %dag_id, groups = open.len(), "Expanding all groups");

                let layout =
                    selection_to_row_data(&grid.groups, &grid.dag_runs, &selection, &open);
                (layout, Vec::new())
            }
        };

        Ok(format_gantt(
            &layout,
            &warnings,
            self.width,
            ctx.timezone,
            ctx.now,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, children: Vec<Task>) -> Task {
        Task {
            id: id.to_string(),
            label: id.to_string(),
            instances: Vec::new(),
            children,
        }
    }

    #[test]
    fn test_group_ids_collects_nested_groups() {
        let tree = task(
            "",
            vec![
                task("extract", vec![]),
                task(
                    "transform",
                    vec![task("transform.inner", vec![task("transform.inner.x", vec![])])],
                ),
            ],
        );
        let mut ids = HashSet::new();
        group_ids(&tree, &mut ids);

        // root included
        assert!(ids.contains("transform"));
        assert!(ids.contains("transform.inner"));
        assert!(!ids.contains("extract"));
        assert_eq!(ids.len(), 3);
    }
}
