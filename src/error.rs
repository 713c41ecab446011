//! Error types for form expansion and compilation

use thiserror::Error;

/// Result type for expand/compile operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors surfaced to callers of `expand` and `compile`.
///
/// A failed request never yields a partial schema or a partially
/// merged Master.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Unknown field '{field}' in class {class}{}", suggestion_suffix(.suggestion))]
    UnknownField {
        field: String,
        class: String,
        suggestion: Option<String>,
    },

    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("Patch application failed: {0}")]
    PatchApplication(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Cyclic form inheritance: {}", .chain.join(" -> "))]
    CyclicInheritance { chain: Vec<String> },

    #[error("Form not found: {0}")]
    FormNotFound(String),

    #[error("Form storage error: {0}")]
    Storage(String),

    #[error("Invalid Master: {0}")]
    InvalidMaster(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{}'?)", name),
        None => String::new(),
    }
}

/// Errors from the metadata layer.
///
/// Cloneable because every waiter on a deduplicated fetch receives the
/// same settled result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("{0}")]
    Unavailable(String),

    #[error("Metadata transport error: {0}")]
    Transport(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for MetadataError {
    fn from(err: reqwest::Error) -> Self {
        MetadataError::Transport(err.to_string())
    }
}

impl From<MetadataError> for CompileError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::Unavailable(msg) => CompileError::MetadataUnavailable(msg),
            MetadataError::Transport(msg) => CompileError::MetadataUnavailable(msg),
            MetadataError::Cancelled => CompileError::Cancelled,
        }
    }
}

/// Errors from a form storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Form not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<StorageError> for CompileError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => CompileError::FormNotFound(id),
            StorageError::Cancelled => CompileError::Cancelled,
            other => CompileError::Storage(other.to_string()),
        }
    }
}
