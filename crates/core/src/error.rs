//! Error types shared by the store, the side-store and the sync engine.

use thiserror::Error;

/// Rejections raised before a command is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Task title cannot be empty")]
    EmptyTitle,

    #[error("Task title cannot exceed {max} characters (got {len})")]
    TitleTooLong { len: usize, max: usize },

    #[error("Task description cannot exceed {max} characters (got {len})")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    #[error("Invalid category color '{0}': expected #rgb or #rrggbb")]
    InvalidColor(String),
}

/// Failures talking to the remote task API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Could not decode response: {0}")]
    Decode(String),

    #[error("Task {0} not found")]
    NotFound(String),

    #[error("Injected failure: {0}")]
    Injected(String),
}

/// Failures reading or writing the extras side-store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to open extras store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// Errors that cross the sync engine boundary back to the caller.
///
/// Only `load` and ADD surface these; toggle, delete and edit failures are
/// compensated inside the engine.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
pub type StorageResult<T> = std::result::Result<T, StorageError>;
pub type SyncResult<T> = std::result::Result<T, SyncError>;
