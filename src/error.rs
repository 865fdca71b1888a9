//! Failure modes of task operations.
//!
//! None of these are fatal. The store reports them to the user and carries
//! on with its previous state.

use thiserror::Error;

use crate::task::TaskId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The input was rejected; the user has to correct it.
    #[error("validation error: {0}")]
    Validation(String),

    /// The task no longer exists on the server.
    #[error("task {id} not found")]
    NotFound { id: TaskId },

    /// The service could not be reached or answered with something unusable.
    #[error("transport error: {0}")]
    Transport(String),
}

impl TaskError {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport(reason.into())
    }

    pub fn unexpected_status(status: u16, body: &str) -> Self {
        if body.is_empty() {
            Self::Transport(format!("unexpected status {status}"))
        } else {
            Self::Transport(format!("unexpected status {status}: {body}"))
        }
    }
}

impl From<reqwest::Error> for TaskError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;
