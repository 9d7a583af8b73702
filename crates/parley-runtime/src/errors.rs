//! Bridge error types.

use parley_conduit::ConduitError;
use parley_sessions::SessionStoreError;
use thiserror::Error;

/// Failure of one message round trip.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The global in-flight cap was reached. Never queued.
    #[error("Too many requests (max {max} concurrent)")]
    AdmissionRejected {
        /// Configured cap.
        max: usize,
    },

    /// The invocation failed in a way that points at a stale session; the
    /// thread's cached token has been evicted.
    #[error(transparent)]
    SessionResume(ConduitError),

    /// Any other invocation failure.
    #[error(transparent)]
    Invocation(ConduitError),

    /// Persisting the session cache failed.
    #[error(transparent)]
    Store(#[from] SessionStoreError),

    /// The serialized task panicked.
    #[error("invocation aborted")]
    Aborted,
}

impl BridgeError {
    /// The conduit error behind this failure, if any.
    pub fn conduit_error(&self) -> Option<&ConduitError> {
        match self {
            Self::SessionResume(e) | Self::Invocation(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_message() {
        assert_eq!(
            BridgeError::AdmissionRejected { max: 3 }.to_string(),
            "Too many requests (max 3 concurrent)"
        );
    }

    #[test]
    fn session_resume_displays_underlying_error() {
        let inner = ConduitError::ProcessFailed {
            code: Some(1),
            stderr: "session not found".into(),
        };
        let expected = inner.to_string();
        let err = BridgeError::SessionResume(inner);
        assert_eq!(err.to_string(), expected);
        assert!(err.conduit_error().is_some());
    }
}
