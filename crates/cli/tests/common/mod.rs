//! Test infrastructure for integration tests
//!
//! Each test gets its own mock dashboard and a command context pointing at
//! it, so no state is shared between tests.

use chrono::{DateTime, TimeZone, Utc};
use ganttview_cli::commands::{Command, Context, FiltersCommand, GanttCommand, TiDataCommand};
use ganttview_core::{ApiClient, ClientConfig, DisplayTimezone};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A two hour window ending at 10:00 UTC.
pub const WINDOW_QUERY: &str = "base_date=2024-01-01T10:00:00Z&time_range=2h";

/// Test context containing a mock server and a context bound to it
pub struct TestContext {
    pub server: MockServer,
    pub ctx: Context,
}

impl TestContext {
    /// Start a mock server and build a UTC context at [`now`].
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let config = ClientConfig::new(&server.uri()).unwrap();
        let ctx = Context {
            client: ApiClient::new(config).unwrap(),
            timezone: DisplayTimezone::Utc,
            now: now(),
        };
        Self { server, ctx }
    }

    /// Answer the task-instance endpoint for [`WINDOW_QUERY`] with `response`.
    pub async fn mount_ti_data(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/object/ti_data"))
            .and(query_param("startDate", "2024-01-01T08:00:00.000Z"))
            .and(query_param("endDate", "2024-01-01T10:00:00.000Z"))
            .and(query_param("numRuns", "200"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Answer the grid-data endpoint of `dag_id` with `response`.
    pub async fn mount_grid_data(&self, dag_id: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/object/grid_data"))
            .and(query_param("dag_id", dag_id))
            .and(query_param("num_runs", "200"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Run a command against the mock server.
    pub async fn run(&self, command: Command) -> ganttview_cli::CliResult<String> {
        command.execute(&self.ctx).await
    }
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
}

/// A finished task instance on `host`.
pub fn ti(host: &str, task_id: &str, start: &str, end: &str) -> Value {
    json!({
        "dag_id": "etl",
        "run_id": "r1",
        "task_id": task_id,
        "try_number": 1,
        "hostname": host,
        "start_date": start,
        "end_date": end,
        "state": "success"
    })
}

pub fn ti_body(tis: Vec<Value>, warnings: Vec<&str>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "tis": tis, "warnings": warnings }))
}

/// Grid data with a plain task, a group holding one task, and two runs.
pub fn grid_body() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "groups": {
            "id": null,
            "label": null,
            "children": [
                {"id": "extract", "label": "extract", "instances": [
                    {"run_id": "r2", "task_id": "extract", "state": "success",
                     "start_date": "2024-01-01T09:00:00+00:00",
                     "end_date": "2024-01-01T09:10:00+00:00"}
                ]},
                {"id": "transform", "label": "transform", "instances": [], "children": [
                    {"id": "transform.clean", "label": "clean", "instances": [
                        {"run_id": "r2", "task_id": "transform.clean", "state": "running",
                         "start_date": "2024-01-01T09:05:00+00:00"}
                    ]}
                ]}
            ]
        },
        "dag_runs": [
            {"run_id": "r1", "state": "success",
             "start_date": "2024-01-01T08:00:00+00:00",
             "end_date": "2024-01-01T08:20:00+00:00"},
            {"run_id": "r2", "state": "running",
             "start_date": "2024-01-01T09:00:00+00:00"}
        ]
    }))
}

pub fn filters_cmd(query: &str) -> Command {
    Command::Filters(FiltersCommand {
        query: query.to_string(),
    })
}

pub fn ti_data_cmd(host: Option<&str>, json: bool) -> Command {
    Command::TiData(TiDataCommand {
        query: WINDOW_QUERY.to_string(),
        host: host.map(str::to_string),
        json,
    })
}

pub fn gantt_cmd(dag_id: Option<&str>, run_id: Option<&str>, task_id: Option<&str>) -> Command {
    Command::Gantt(GanttCommand {
        query: WINDOW_QUERY.to_string(),
        dag_id: dag_id.map(str::to_string),
        run_id: run_id.map(str::to_string),
        task_id: task_id.map(str::to_string),
        width: 80,
    })
}
