//! Session store error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by session cache construction and persistence.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// The configured TTL was zero.
    #[error("session TTL must be greater than zero")]
    InvalidTtl,

    /// Creating the directory or writing the temp file failed.
    #[error("failed to write session store {}: {source}", path.display())]
    Io {
        /// Target file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Serializing the snapshot failed.
    #[error("failed to serialize session store: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Renaming the temp file over the target failed.
    #[error("failed to replace session store {}: {source}", path.display())]
    Persist {
        /// Target file.
        path: PathBuf,
        /// Underlying I/O error from the rename.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, SessionStoreError>;
