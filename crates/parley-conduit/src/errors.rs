//! Conduit error types.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single agent invocation.
///
/// Display strings are part of the HTTP contract: they are returned to the
/// caller (truncated) and scanned for resume markers.
#[derive(Debug, Error)]
pub enum ConduitError {
    /// The binary could not be started.
    #[error("Failed to spawn claude: {0}")]
    Spawn(String),

    /// The child ran past its deadline and was killed.
    #[error("Claude CLI timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The child exited with a non-zero status.
    #[error("Claude CLI exited with code {}: {stderr}", code.map_or_else(|| "null".to_string(), |c| c.to_string()))]
    ProcessFailed {
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Trimmed, truncated stderr.
        stderr: String,
    },

    /// Stdout was not a JSON result document.
    #[error("Failed to parse Claude CLI output: {excerpt}")]
    MalformedOutput {
        /// First 500 characters of stdout.
        excerpt: String,
    },
}

/// Result type for conduit operations.
pub type Result<T> = std::result::Result<T, ConduitError>;
