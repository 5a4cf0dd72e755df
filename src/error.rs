use thiserror::Error;

/// Failure of a call across the backend boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached, exited, or rejected the call.
    #[error("backend unavailable ({command}): {reason}")]
    Unavailable { command: String, reason: String },
    #[error("backend payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    pub fn unavailable(command: &str, reason: impl Into<String>) -> Self {
        BackendError::Unavailable {
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("profile name is empty")]
    EmptyName,
}
