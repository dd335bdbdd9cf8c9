#![warn(missing_docs)]

//! Undo/redo transaction engine
//!
//! Groups mutations of tracked state into named [`ChangeScope`]s whose
//! captured inverse records can be replayed to undo them, and orchestrates
//! undo/redo stacks of completed scopes with [`ScopeStackManager`].
//!
//! ```ignore
//! let ctx = ScopeContext::new();
//! let manager = ScopeStackManager::new(Arc::clone(&ctx))?;
//!
//! let guard = ctx.begin("Rename");
//! // mutate tracked containers bound to `ctx`
//! if let Some(scope) = guard.finish() {
//!     manager.commit(scope, ScopeKind::Do);
//! }
//!
//! manager.undo(None).await?;
//! manager.redo(None).await?;
//! ```

pub mod change;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod queue;
pub mod scope;

// Re-export public API
pub use change::{ChangeRecord, ClosureInverse, InstanceRef, InverseAction};
pub use config::EngineConfig;
pub use error::{Result, UndoScopeError};
pub use logging::{init_logging, LogLevel};
pub use manager::{Availability, HistoryItem, ScopeKind, ScopeStackManager, StackEntry};
pub use queue::{submit, CommandQueue, Job, SerialWorkQueue};
pub use scope::{ChangeScope, ScopeContext, ScopeEntry, ScopeGuard, ScopeState};
