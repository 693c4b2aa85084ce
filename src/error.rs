//! Error types shared by the session core, the stores and the terminal host.

use std::path::PathBuf;
use thiserror::Error;

use crate::document::DocumentId;

/// Reasons a session transition was refused or cut short.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid session setting '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    #[error("no active document to write in")]
    NoActiveDocument,

    #[error("a writing session is already active")]
    AlreadyActive,

    #[error("document '{0}' is no longer reachable")]
    DocumentUnreachable(DocumentId),
}

impl SessionError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        SessionError::InvalidConfig {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Failures of the session history store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to open history database at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("history query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history is unavailable: {0}")]
    Unavailable(String),
}

/// Failures writing back to a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document '{0}' not found")]
    NotFound(DocumentId),

    #[error("document '{0}' is read-only")]
    ReadOnly(DocumentId),
}

/// Settings loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("failed to write settings to {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode settings: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
