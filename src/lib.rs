//! Shared fixtures for the undoscope integration tests

use std::sync::Arc;

use undoscope_core::{ChangeScope, Result, ScopeContext, ScopeKind, ScopeStackManager};

/// A scope context with its stack manager, the way a host document owns them
pub struct Session {
    /// Context every tracked container in the session records into
    pub context: Arc<ScopeContext>,
    /// Undo/redo stacks for the session
    pub manager: ScopeStackManager,
}

impl Session {
    /// Fresh context and manager with default configuration
    pub fn new() -> Result<Self> {
        let context = ScopeContext::new();
        let manager = ScopeStackManager::new(Arc::clone(&context))?;
        Ok(Self { context, manager })
    }

    /// Run `edit` inside a scope named `name` and commit it as a user action.
    ///
    /// Returns the committed scope, or `None` when the edit recorded nothing.
    pub fn perform<F>(&self, name: &str, edit: F) -> Option<Arc<ChangeScope>>
    where
        F: FnOnce(),
    {
        let guard = self.context.begin(name);
        edit();
        let scope = guard.finish()?;
        if scope.is_empty() {
            return None;
        }
        self.manager.commit(Arc::clone(&scope), ScopeKind::Do);
        Some(scope)
    }
}
