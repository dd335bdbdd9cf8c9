//! Error types for the scope engine

use thiserror::Error;

/// Errors that can occur in the scope engine
#[derive(Debug, Error)]
pub enum UndoScopeError {
    /// Nothing left to undo
    #[error("No more undos available")]
    NoMoreUndos,

    /// Nothing left to redo
    #[error("No more redos available")]
    NoMoreRedos,

    /// Another scope is recording, so a replay cannot open its own scope
    #[error("Scope '{0}' is already recording")]
    ScopeBusy(String),

    /// The serialized command queue worker is gone
    #[error("Command queue closed")]
    QueueClosed,

    /// A replay task did not run to completion
    #[error("Replay failed: {0}")]
    ReplayFailed(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but is not usable
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl UndoScopeError {
    /// Create a new ScopeBusy error naming the scope that holds the context
    pub fn scope_busy(name: impl Into<String>) -> Self {
        Self::ScopeBusy(name.into())
    }

    /// Create a new ReplayFailed error with context
    pub fn replay_failed(msg: impl Into<String>) -> Self {
        Self::ReplayFailed(msg.into())
    }

    /// Create a new ValidationError with context
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

/// Result type for scope engine operations
pub type Result<T> = std::result::Result<T, UndoScopeError>;
