use ganttview_core::CoreError;
use thiserror::Error;

/// Error types for the ganttview CLI
#[derive(Error, Debug)]
pub enum CliError {
    /// Backend request or configuration failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// JSON output could not be produced
    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    /// Argument values that parse but make no sense together
    #[error("{message}")]
    InvalidArgument { message: String },
}

impl CliError {
    /// Get the full error message including nested transport details.
    ///
    /// Sources already contained in the message are not repeated.
    pub fn full_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            let text = err.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = err.source();
        }
        message
    }
}

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;
