//! Error types for tracked containers

use thiserror::Error;

/// Errors surfaced by tracked containers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// Bounds-checked access outside the container
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Length at the time of the access
        len: usize,
    },

    /// `pop` or `dequeue` on an empty container
    #[error("Container is empty")]
    EmptyContainer,
}

/// Failure reported by a notification observer.
///
/// Observer failures are logged at the container boundary and never abort
/// the mutation that triggered them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Observer failed: {0}")]
pub struct ObserverError(pub String);

impl ObserverError {
    /// Create a new ObserverError with context
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Result type for container operations
pub type Result<T> = std::result::Result<T, CollectionError>;
