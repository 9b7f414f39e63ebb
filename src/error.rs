use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failures a command can surface to the caller. Timeouts inside the
/// coordinator's own wait intervals are recovered locally and never appear
/// here; only the outer command deadline produces `Timeout`.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("no media session found")]
    NotFound { requested: Option<String> },

    #[error("command timed out after {}ms", .deadline.as_millis())]
    Timeout { deadline: Duration },

    #[cfg(target_os = "linux")]
    #[error("media transport failure: {0}")]
    Transport(#[from] zbus::Error),

    #[cfg(target_os = "windows")]
    #[error("media transport failure: {0}")]
    Transport(#[from] windows::core::Error),

    #[error("failed to serialize output: {0}")]
    Output(#[from] serde_json::Error),
}

/// The JSON error object printed on stderr when a command fails.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub message: String,
    pub details: String,
}

impl From<&ControlError> for CommandError {
    fn from(err: &ControlError) -> Self {
        CommandError {
            message: err.to_string(),
            details: format!("{err:?}"),
        }
    }
}
