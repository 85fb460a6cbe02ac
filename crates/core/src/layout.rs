//! Row layout for the gantt timeline.
//!
//! Turns the task-group tree plus the selected run into a tree of
//! [`RowData`], and computes the time window that fits every instance.
//! The cluster view uses [`host_rows`] instead, grouping instances by worker.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{DagRun, Selection, Task, TaskInstance};

/// Shown instead of a chart when no run is selected.
pub const SELECT_RUN_MESSAGE: &str = "Please select a dag run in order to see a gantt chart";

/// Host name used for instances that never reported one.
pub const UNKNOWN_HOST: &str = "unknown";

/// Id and label of the task that owns a row item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMeta {
    pub id: String,
    pub label: String,
}

impl From<&Task> for TaskMeta {
    fn from(task: &Task) -> Self {
        TaskMeta {
            id: task.id.clone(),
            label: task.label.clone(),
        }
    }
}

/// Navigation target for an item: the dag's grid page focused on one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLink {
    pub dag_id: String,
    pub run_id: String,
    pub task_id: String,
}

impl GridLink {
    /// Relative URL `dags/<dag>/grid?dag_run_id=..&task_id=..&tab=gantt`.
    pub fn href(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("dag_run_id", &self.run_id)
            .append_pair("task_id", &self.task_id)
            .append_pair("tab", "gantt")
            .finish();
        format!("dags/{}/grid?{}", urlencoding::encode(&self.dag_id), query)
    }
}

/// One positioned item within a row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowItemData {
    pub is_selected: bool,
    pub instance: TaskInstance,
    pub task: TaskMeta,
    pub link: Option<GridLink>,
    pub title: Option<String>,
}

/// A presentation row: its items plus nested child rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RowData {
    pub id: String,
    pub label: String,
    pub is_open: bool,
    pub items: Vec<RowItemData>,
    pub children: Vec<RowData>,
}

impl RowData {
    /// Whether any item in this row is selected.
    pub fn is_selected(&self) -> bool {
        self.items.iter().any(|item| item.is_selected)
    }

    /// Whether this row has child rows.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Rows plus the time window they are drawn against.
#[derive(Debug, Clone, PartialEq)]
pub struct GanttLayout {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub rows: Vec<RowData>,
}

fn walk_task(task: &Task, selected: &Selection, open_group_ids: &HashSet<String>) -> RowData {
    let run_id = selected.run_id.as_deref();
    let task_id = selected.task_id.as_deref();

    let items = task
        .instances
        .iter()
        .filter(|ti| Some(ti.run_id.as_str()) == run_id)
        .map(|ti| RowItemData {
            is_selected: Some(ti.task_id.as_str()) == task_id,
            instance: ti.clone(),
            task: TaskMeta::from(task),
            link: None,
            title: None,
        })
        .collect();

    RowData {
        id: task.id.clone(),
        label: task.label.clone(),
        is_open: open_group_ids.contains(&task.id),
        items,
        children: task
            .children
            .iter()
            .map(|child| walk_task(child, selected, open_group_ids))
            .collect(),
    }
}

/// Build rows for the selected run and the window that contains them.
///
/// Every node below the root becomes a row whether or not it is expanded;
/// `open_group_ids` only sets `is_open`. Callers check that a run is
/// selected first; with no run every row is empty and the window is unset.
pub fn selection_to_row_data(
    groups: &Task,
    dag_runs: &[DagRun],
    selected: &Selection,
    open_group_ids: &HashSet<String>,
) -> GanttLayout {
    let rows: Vec<RowData> = groups
        .children
        .iter()
        .map(|task| walk_task(task, selected, open_group_ids))
        .collect();

    let dag_run = dag_runs
        .iter()
        .find(|run| Some(run.run_id.as_str()) == selected.run_id.as_deref());
    let run_start = dag_run.and_then(|run| run.queued_at.or(run.start_date));
    let run_end = dag_run.and_then(|run| run.end_date);

    let (start_date, end_date) = find_date_boundaries(run_start, run_end, &rows);
    GanttLayout {
        start_date,
        end_date,
        rows,
    }
}

/// Widen `[start, end]` to cover every instance in `rows`, nested rows included.
///
/// The start moves to the earliest queued or start time and the end to the
/// latest end time. The window never narrows.
pub fn find_date_boundaries(
    mut start: Option<DateTime<Utc>>,
    mut end: Option<DateTime<Utc>>,
    rows: &[RowData],
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    for row in rows {
        for item in &row.items {
            let ti = &item.instance;
            for candidate in [ti.queued_dttm, ti.start_date].into_iter().flatten() {
                if start.is_none_or(|s| candidate < s) {
                    start = Some(candidate);
                }
            }
            if let Some(candidate) = ti.end_date {
                if end.is_none_or(|e| candidate > e) {
                    end = Some(candidate);
                }
            }
        }
        (start, end) = find_date_boundaries(start, end, &row.children);
    }
    (start, end)
}

/// One open row per worker host, sorted by host name.
///
/// Instances without a hostname are grouped under [`UNKNOWN_HOST`].
pub fn host_rows(tis: &[TaskInstance]) -> Vec<RowData> {
    let mut hosts: BTreeMap<String, Vec<RowItemData>> = BTreeMap::new();

    for ti in tis {
        let host = ti.hostname.as_deref().unwrap_or(UNKNOWN_HOST).to_string();
        let dag_id = ti.dag_id.clone().unwrap_or_default();
        hosts.entry(host).or_default().push(RowItemData {
            is_selected: false,
            instance: ti.clone(),
            task: TaskMeta {
                id: ti.task_id.clone(),
                label: format!("{} _ {}", dag_id, ti.task_id),
            },
            link: Some(GridLink {
                dag_id: dag_id.clone(),
                run_id: ti.run_id.clone(),
                task_id: ti.task_id.clone(),
            }),
            title: Some(format!("{} {}", dag_id, ti.task_id)),
        });
    }

    hosts
        .into_iter()
        .map(|(name, items)| RowData {
            id: name.clone(),
            label: name,
            is_open: true,
            items,
            children: Vec::new(),
        })
        .collect()
}

/// A row in render order with its nesting depth.
#[derive(Debug, Clone, Copy)]
pub struct VisibleRow<'a> {
    pub depth: usize,
    pub row: &'a RowData,
}

fn push_visible<'a>(rows: &'a [RowData], depth: usize, out: &mut Vec<VisibleRow<'a>>) {
    for row in rows {
        out.push(VisibleRow { depth, row });
        if row.is_open {
            push_visible(&row.children, depth + 1, out);
        }
    }
}

/// Rows in the order they are drawn: a row, then its children if it is open.
///
/// Both the label pane and the timeline iterate this list so that line `n`
/// of one matches line `n` of the other.
pub fn flatten_visible(rows: &[RowData]) -> Vec<VisibleRow<'_>> {
    let mut out = Vec::new();
    push_visible(rows, 0, &mut out);
    out
}

/// Remembers the last layout input and reports when it changes.
#[derive(Debug, Clone)]
pub struct LayoutGuard<K> {
    previous: Option<K>,
}

impl<K> Default for LayoutGuard<K> {
    fn default() -> Self {
        Self { previous: None }
    }
}

impl<K: PartialEq> LayoutGuard<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `next`; returns true when it differs from the stored value.
    pub fn changed(&mut self, next: K) -> bool {
        if self.previous.as_ref() == Some(&next) {
            return false;
        }
        self.previous = Some(next);
        true
    }

    /// Forget the stored value so the next call reports a change.
    pub fn invalidate(&mut self) {
        self.previous = None;
    }
}
