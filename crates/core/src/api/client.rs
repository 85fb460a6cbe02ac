use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, COOKIE};
use tracing::{debug, warn};
use url::Url;

use super::{
    ApiResponse, GridDataSource, TaskInstanceSource, TaskInstancesResult, grid_data_path,
    map_response, ti_data_path,
};
use crate::error::{CoreError, CoreResult};
use crate::filters::FetchFilters;
use crate::models::{ApiGridData, GridData};

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub session_cookie: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Parse `base_url`; a trailing slash is added so relative paths join under it.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidUrl` if the value is not an absolute URL.
    pub fn new(base_url: &str) -> CoreResult<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized).map_err(|source| CoreError::InvalidUrl {
            value: base_url.to_string(),
            source,
        })?;

        Ok(Self {
            base_url,
            session_cookie: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Send this `Cookie` header value with every request.
    pub fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = cookie.filter(|c| !c.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for the dashboard's object endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: Client,
}

impl ApiClient {
    /// Build a client from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Http` if the underlying HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> CoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CoreError::http(config.base_url.as_str(), e))?;
        Ok(Self { config, http })
    }

    /// Resolve a relative endpoint path against the base URL.
    pub fn url_for(&self, path: &str) -> CoreResult<Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|source| CoreError::InvalidUrl {
                value: path.to_string(),
                source,
            })
    }

    /// GET a path and return the body text.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Http` on transport failure and `CoreError::Status`
    /// for non-success responses.
    async fn get_text(&self, path: &str) -> CoreResult<String> {
        let url = self.url_for(path)?;
        debug!(url = %url, "GET");

        let mut request = self.http.get(url.clone()).header(ACCEPT, "text/plain");
        if let Some(cookie) = &self.config.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CoreError::http(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| CoreError::http(url.as_str(), e))
    }

    /// Fetch task instances for a filter window.
    pub async fn fetch_filtered(&self, filters: &FetchFilters) -> CoreResult<TaskInstancesResult> {
        let response = self.fetch_task_instances(&ti_data_path(filters)).await?;
        Ok(map_response(response))
    }
}

#[async_trait]
impl TaskInstanceSource for ApiClient {
    async fn fetch_task_instances(&self, path: &str) -> CoreResult<Option<ApiResponse>> {
        let body = self.get_text(path).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<Option<ApiResponse>>(&body) {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(path, error = %e, "Unreadable task instance payload");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl GridDataSource for ApiClient {
    /// # Errors
    ///
    /// Besides transport and status errors, returns `CoreError::Decode` if
    /// the body is not grid data.
    async fn fetch_grid_data(&self, dag_id: &str, num_runs: u32) -> CoreResult<GridData> {
        let path = grid_data_path(dag_id, num_runs);
        let body = self.get_text(&path).await?;
        let grid: ApiGridData = serde_json::from_str(&body).map_err(|source| CoreError::Decode {
            url: path.clone(),
            source,
        })?;
        Ok(GridData::from(grid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_adds_trailing_slash() {
        let config = ClientConfig::new("http://airflow.local:8080/home").unwrap();
        assert_eq!(config.base_url.as_str(), "http://airflow.local:8080/home/");
        assert!(config.session_cookie.is_none());
    }

    #[test]
    fn test_config_rejects_relative_url() {
        let err = ClientConfig::new("airflow").unwrap_err();
        assert!(matches!(err, CoreError::InvalidUrl { .. }));
    }

    #[test]
    fn test_config_ignores_empty_cookie() {
        let config = ClientConfig::new(DEFAULT_BASE_URL)
            .unwrap()
            .with_session_cookie(Some(String::new()));
        assert!(config.session_cookie.is_none());
    }

    #[test]
    fn test_url_for_joins_relative_path() {
        let client = ApiClient::new(ClientConfig::new("http://localhost:8080/airflow").unwrap()).unwrap();
        let url = client.url_for("object/ti_data?numRuns=5").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/airflow/object/ti_data?numRuns=5");
    }
}
