//! Backend access: the task-instance and grid-data endpoints.
//!
//! [`client::ApiClient`] talks HTTP; [`query::TaskInstanceQuery`] caches
//! results per query key on top of any [`TaskInstanceSource`].

pub mod client;
pub mod query;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::CoreResult;
use crate::filters::FetchFilters;
use crate::models::{ApiTaskInstance, GridData, TaskInstance};

pub use client::{ApiClient, ClientConfig};
pub use query::{AutoRefresh, QueryState, TaskInstanceQuery};

/// Warning reported when the backend answers with something unusable.
pub const INVALID_RESPONSE_WARNING: &str = "Invalid response, maybe not logged in?";

/// Raw `object/ti_data` payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub tis: Vec<ApiTaskInstance>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Task instances ready for display, plus backend warnings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskInstancesResult {
    pub tis: Vec<TaskInstance>,
    pub warnings: Vec<String>,
}

/// Convert a payload into display data.
///
/// A missing payload becomes an empty result carrying
/// [`INVALID_RESPONSE_WARNING`] instead of an error.
pub fn map_response(response: Option<ApiResponse>) -> TaskInstancesResult {
    match response {
        Some(ApiResponse { tis, warnings }) => TaskInstancesResult {
            tis: tis.into_iter().map(TaskInstance::from).collect(),
            warnings,
        },
        None => {
            warn!("{}", INVALID_RESPONSE_WARNING);
            TaskInstancesResult {
                tis: Vec::new(),
                warnings: vec![INVALID_RESPONSE_WARNING.to_string()],
            }
        }
    }
}

/// Relative path (and cache key) of a task-instance fetch.
pub fn ti_data_path(filters: &FetchFilters) -> String {
    format!("object/ti_data?{}", filters.to_query_string())
}

/// Relative path of the grid data for one dag.
pub fn grid_data_path(dag_id: &str, num_runs: u32) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("dag_id", dag_id)
        .append_pair("num_runs", &num_runs.to_string())
        .finish();
    format!("object/grid_data?{}", query)
}

/// Anything that can answer a task-instance query path.
///
/// `Ok(None)` means the backend answered but the body was empty or not a
/// task-instance payload.
#[async_trait]
pub trait TaskInstanceSource: Send + Sync {
    async fn fetch_task_instances(&self, path: &str) -> CoreResult<Option<ApiResponse>>;
}

/// Anything that can supply a dag's task tree and recent runs.
#[async_trait]
pub trait GridDataSource: Send + Sync {
    async fn fetch_grid_data(&self, dag_id: &str, num_runs: u32) -> CoreResult<GridData>;
}
