//! Core library for ganttview
//!
//! Data models for task instances and dag runs, the row layout and time
//! geometry behind the gantt timeline, query-parameter backed filter state,
//! backend fetching with a key-addressed cache, and pane scroll syncing.
//! Nothing here depends on a terminal; the TUI and CLI crates render it.

pub mod api;
pub mod datetime;
pub mod error;
pub mod filters;
pub mod geometry;
pub mod layout;
pub mod models;
pub mod scroll;

pub use api::{
    ApiClient, ApiResponse, ClientConfig, GridDataSource, INVALID_RESPONSE_WARNING, QueryState,
    TaskInstanceQuery, TaskInstanceSource, TaskInstancesResult,
};
pub use datetime::DisplayTimezone;
pub use error::{CoreError, CoreResult};
pub use filters::{Debounced, FetchFilters, FilterState, Filters, QueryParams};
pub use geometry::{GanttScale, ItemGeometry, Ruler, Segment};
pub use layout::{GanttLayout, RowData, RowItemData, TaskMeta};
pub use models::{DagRun, GridData, Selection, Task, TaskInstance, TaskState};
pub use scroll::{ScrollPane, ScrollSync};

static_assertions::assert_impl_all!(ApiClient: Send, Sync);
static_assertions::assert_impl_all!(TaskInstancesResult: Send, Sync);
