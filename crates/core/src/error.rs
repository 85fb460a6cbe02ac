use thiserror::Error;

/// Error types for ganttview data access
#[derive(Error, Debug)]
pub enum CoreError {
    /// Transport-level failure talking to the backend
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<reqwest::Error>,
    },

    /// Backend answered with a non-success status code
    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Response body could not be decoded
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Base URL or endpoint path is not a valid URL
    #[error("Invalid URL '{value}': {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

impl CoreError {
    /// Build an `Http` error for the given request URL.
    pub fn http(url: impl Into<String>, err: reqwest::Error) -> Self {
        CoreError::Http {
            url: url.into(),
            source: Box::new(err),
        }
    }

    /// Whether the error came from the server rather than the network.
    pub fn is_status(&self) -> bool {
        matches!(self, CoreError::Status { .. })
    }
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
