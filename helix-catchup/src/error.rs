//! Catch-up tracking error types.

use thiserror::Error;

/// Result type for catch-up tracking operations.
pub type CatchupResult<T> = Result<T, CatchupError>;

/// Errors that can occur while tracking catch-up progress.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatchupError {
    /// The storage engine could not report the head of the log.
    #[error("upstream unavailable: {cause}")]
    UpstreamUnavailable {
        /// Why the head could not be determined.
        cause: UnavailableCause,
    },

    /// A position or argument was rejected by `helix-core`.
    #[error(transparent)]
    Core(#[from] helix_core::Error),
}

/// Why the head of the log could not be determined.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnavailableCause {
    /// The storage engine could not be reached.
    #[error("{operation}: {message}")]
    Unreachable {
        /// The operation that failed.
        operation: &'static str,
        /// Error message.
        message: String,
    },

    /// The log holds no events yet.
    #[error("log is empty")]
    EmptyLog,

    /// The caller stopped waiting for the storage engine.
    #[error("timed out after {waited_ms}ms")]
    TimedOut {
        /// How long the caller waited, in milliseconds.
        waited_ms: u64,
    },
}

impl CatchupError {
    /// Creates an `UpstreamUnavailable` error for an unreachable store.
    #[must_use]
    pub fn unreachable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            cause: UnavailableCause::Unreachable {
                operation,
                message: message.into(),
            },
        }
    }

    /// Creates an `UpstreamUnavailable` error for an empty log.
    #[must_use]
    pub const fn empty_log() -> Self {
        Self::UpstreamUnavailable {
            cause: UnavailableCause::EmptyLog,
        }
    }

    /// Returns true if the log simply has no events yet.
    #[must_use]
    pub const fn is_empty_log(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable {
                cause: UnavailableCause::EmptyLog
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CatchupError::unreachable("fetch_head", "connection refused");
        assert_eq!(
            err.to_string(),
            "upstream unavailable: fetch_head: connection refused"
        );

        let err = CatchupError::UpstreamUnavailable {
            cause: UnavailableCause::TimedOut { waited_ms: 250 },
        };
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_is_empty_log() {
        assert!(CatchupError::empty_log().is_empty_log());
        assert!(!CatchupError::unreachable("fetch_head", "down").is_empty_log());
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err = CatchupError::from(helix_core::Error::GapNotBelowIndex { gap: 3, index: 2 });
        assert_eq!(err.to_string(), "gap 3 is not below position index 2");
    }
}
