//! Error types for the task list engine and its storage.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad user input (name, deadline or reminder). Nothing was mutated.
    #[error("{0}")]
    Validation(String),

    /// A zone-changing operation was attempted outside the canonical view.
    #[error("{0}")]
    InvalidState(String),

    #[error("id prefix '{0}' matches more than one task")]
    Ambiguous(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("timestamp formatting error: {0}")]
    Format(#[from] time::error::Format),

    #[error("corrupt task list in {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
