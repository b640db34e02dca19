//! Error types for tracksync

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// True when the underlying cause is "path no longer exists".
    ///
    /// A change notification can outlive the entity it describes; by the time
    /// it is processed the file may already be gone again. That race is benign
    /// and callers swallow it instead of surfacing an error notification.
    pub fn is_not_found(&self) -> bool {
        match self {
            SyncError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            SyncError::Walk(e) => e
                .io_error()
                .map_or(false, |io| io.kind() == std::io::ErrorKind::NotFound),
            SyncError::Watch(e) => match &e.kind {
                notify::ErrorKind::PathNotFound => true,
                notify::ErrorKind::Io(io) => io.kind() == std::io::ErrorKind::NotFound,
                _ => false,
            },
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
