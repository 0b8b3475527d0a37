//! Error types for Helix core operations.
//!
//! Following `TigerStyle`: all errors must be handled explicitly.
//! No silent failures, no ignored errors.

use thiserror::Error;

/// The result type for Helix core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Helix core operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A gap was placed at or above the index of its position.
    #[error("gap {gap} is not below position index {index}")]
    GapNotBelowIndex {
        /// The offending gap.
        gap: u64,
        /// The index of the position being built.
        index: u64,
    },

    /// A position was asked to advance to an index it already covers.
    #[error("index {index} is already covered by position {position}")]
    AlreadyCovered {
        /// The index that was offered.
        index: u64,
        /// The index of the position that already covers it.
        position: u64,
    },

    /// An invalid argument was provided.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// The name of the argument.
        name: &'static str,
        /// Why it was invalid.
        reason: &'static str,
    },
}
