//! Data models for task instances, task groups and dag runs
//!
//! The backend speaks snake_case JSON. Wire types (`Api*`) are converted
//! into the display types through one explicit `From` impl each, so a new
//! wire field fails to compile until it is mapped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Success,
    Running,
    Failed,
    UpstreamFailed,
    Skipped,
    UpForRetry,
    UpForReschedule,
    Queued,
    Scheduled,
    Deferred,
    Removed,
    Restarting,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Returns the string representation used by the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Success => "success",
            TaskState::Running => "running",
            TaskState::Failed => "failed",
            TaskState::UpstreamFailed => "upstream_failed",
            TaskState::Skipped => "skipped",
            TaskState::UpForRetry => "up_for_retry",
            TaskState::UpForReschedule => "up_for_reschedule",
            TaskState::Queued => "queued",
            TaskState::Scheduled => "scheduled",
            TaskState::Deferred => "deferred",
            TaskState::Removed => "removed",
            TaskState::Restarting => "restarting",
            TaskState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format an optional state the way the dashboard labels "no status".
pub fn state_label(state: Option<TaskState>) -> &'static str {
    state.map_or("no_status", |s| s.as_str())
}

/// Task instance as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiTaskInstance {
    #[serde(default)]
    pub dag_id: Option<String>,
    pub run_id: String,
    pub task_id: String,
    #[serde(default)]
    pub map_index: Option<i64>,
    #[serde(default)]
    pub try_number: u32,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub queued_dttm: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: Option<TaskState>,
}

/// One execution attempt of a task within a dag run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInstance {
    pub dag_id: Option<String>,
    pub run_id: String,
    pub task_id: String,
    pub map_index: Option<i64>,
    pub try_number: u32,
    pub hostname: Option<String>,
    pub queued_dttm: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub state: Option<TaskState>,
}

/// Identity of a task instance: (task, run, try, map index).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    pub task_id: String,
    pub run_id: String,
    pub try_number: u32,
    pub map_index: Option<i64>,
}

impl TaskInstance {
    /// The identity key of this instance.
    pub fn key(&self) -> InstanceKey {
        InstanceKey {
            task_id: self.task_id.clone(),
            run_id: self.run_id.clone(),
            try_number: self.try_number,
            map_index: self.map_index,
        }
    }

    /// Queue time that precedes the start time, if any.
    ///
    /// A queue time with no start yet counts as valid.
    pub fn valid_queued_dttm(&self) -> Option<DateTime<Utc>> {
        let queued = self.queued_dttm?;
        match self.start_date {
            Some(start) if queued >= start => None,
            _ => Some(queued),
        }
    }
}

impl From<ApiTaskInstance> for TaskInstance {
    fn from(api: ApiTaskInstance) -> Self {
        let ApiTaskInstance {
            dag_id,
            run_id,
            task_id,
            map_index,
            try_number,
            hostname,
            queued_dttm,
            start_date,
            end_date,
            state,
        } = api;

        TaskInstance {
            dag_id,
            run_id,
            task_id,
            map_index,
            try_number,
            hostname,
            queued_dttm,
            start_date,
            end_date,
            state,
        }
    }
}

/// Task or task group node as returned in grid data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiTask {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub instances: Vec<ApiTaskInstance>,
    #[serde(default)]
    pub children: Option<Vec<ApiTask>>,
}

/// A task or task group with its instances and child nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub label: String,
    pub instances: Vec<TaskInstance>,
    pub children: Vec<Task>,
}

impl Task {
    /// Check if this node is a group (has children).
    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }
}

impl From<ApiTask> for Task {
    fn from(api: ApiTask) -> Self {
        let ApiTask {
            id,
            label,
            instances,
            children,
        } = api;

        let id = id.unwrap_or_default();
        let label = label.unwrap_or_else(|| id.clone());
        Task {
            id,
            label,
            instances: instances.into_iter().map(TaskInstance::from).collect(),
            children: children
                .unwrap_or_default()
                .into_iter()
                .map(Task::from)
                .collect(),
        }
    }
}

/// One execution of a scheduled workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagRun {
    pub run_id: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// Grid data payload: the task tree plus the recent dag runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiGridData {
    pub groups: ApiTask,
    #[serde(default)]
    pub dag_runs: Vec<DagRun>,
}

/// Task tree and dag runs for one dag.
#[derive(Debug, Clone, PartialEq)]
pub struct GridData {
    pub groups: Task,
    pub dag_runs: Vec<DagRun>,
}

impl From<ApiGridData> for GridData {
    fn from(api: ApiGridData) -> Self {
        GridData {
            groups: Task::from(api.groups),
            dag_runs: api.dag_runs,
        }
    }
}

/// The currently selected run and task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub run_id: Option<String>,
    pub task_id: Option<String>,
}

impl Selection {
    /// Select a run with no task.
    pub fn run(run_id: impl Into<String>) -> Self {
        Self {
            run_id: Some(run_id.into()),
            task_id: None,
        }
    }

    /// Set the selected task.
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}
