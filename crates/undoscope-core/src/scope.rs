//! Change scopes and the context that tracks the recording one
//!
//! A [`ScopeContext`] holds at most one recording [`ChangeScope`]. Tracked
//! containers are bound to a context and append inverse records to whichever
//! scope is recording when they mutate. Nested `enter_or_join` calls reuse
//! the recording scope, so a command that invokes sub-commands still produces
//! a single undo unit.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, OnceLock, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::change::ChangeRecord;
use crate::error::{Result, UndoScopeError};

/// Lifecycle state of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeState {
    /// Accepting records
    Recording,
    /// Closed, records kept for replay
    Closed,
    /// Replayed or abandoned, records discarded
    Consumed,
}

struct ScopeLog {
    state: ScopeState,
    records: Vec<ChangeRecord>,
}

/// A named, bounded span of mutations grouped into one undo unit
pub struct ChangeScope {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    context: Weak<ScopeContext>,
    log: Mutex<ScopeLog>,
    replay_lock: Mutex<()>,
}

impl ChangeScope {
    fn new(name: String, context: Weak<ScopeContext>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            created_at: Utc::now(),
            context,
            log: Mutex::new(ScopeLog {
                state: ScopeState::Recording,
                records: Vec::new(),
            }),
            replay_lock: Mutex::new(()),
        }
    }

    /// Unique identifier of this scope
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Name the scope was opened with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the scope was opened
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current lifecycle state
    pub fn state(&self) -> ScopeState {
        self.log.lock().state
    }

    /// Number of captured records
    pub fn record_count(&self) -> usize {
        self.log.lock().records.len()
    }

    /// Whether the scope holds no records
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// Descriptions of the captured records in append order
    pub fn descriptions(&self) -> Vec<String> {
        self.log
            .lock()
            .records
            .iter()
            .map(ChangeRecord::describe)
            .collect()
    }

    /// Whether this scope is the one its context is recording into
    pub fn is_ambient(&self) -> bool {
        self.context
            .upgrade()
            .map(|ctx| ctx.is_current(self))
            .unwrap_or(false)
    }

    /// Append a record.
    ///
    /// Returns `false` without recording when this scope is not the ambient
    /// scope of its context or is no longer recording. That happens when a
    /// mutation finishes after another thread already closed the scope.
    pub fn record(&self, record: ChangeRecord) -> bool {
        if !self.is_ambient() {
            debug!(scope = %self.name, "Ignoring record for non-ambient scope");
            return false;
        }

        let mut log = self.log.lock();
        if log.state != ScopeState::Recording {
            debug!(scope = %self.name, state = ?log.state, "Ignoring record for closed scope");
            return false;
        }
        log.records.push(record);
        true
    }

    /// Stop recording.
    ///
    /// Only the caller holding the scope's own name can close it, so a nested
    /// caller that joined an outer scope cannot end it early. Returns whether
    /// the scope was closed by this call.
    pub fn close(&self, name: &str) -> bool {
        if self.name != name {
            return false;
        }

        let Some(context) = self.context.upgrade() else {
            let mut log = self.log.lock();
            if log.state == ScopeState::Recording {
                log.state = ScopeState::Closed;
                return true;
            }
            return false;
        };

        let mut current = context.current.lock();
        match current.as_ref() {
            Some(scope) if ptr::eq(Arc::as_ptr(scope), self) => {}
            _ => return false,
        }
        *current = None;

        let mut log = self.log.lock();
        if log.state == ScopeState::Recording {
            log.state = ScopeState::Closed;
        }
        debug!(scope = %self.name, records = log.records.len(), "Scope closed");
        true
    }

    /// Revert every record in reverse append order on the calling thread.
    ///
    /// Does nothing if `name` is not this scope's name or the scope has
    /// already been consumed. Returns whether a replay happened.
    pub fn replay_blocking(&self, name: &str) -> bool {
        if self.name != name {
            debug!(scope = %self.name, requested = %name, "Replay name mismatch");
            return false;
        }
        self.close(name);

        let _replaying = self.replay_lock.lock();
        let records = {
            let mut log = self.log.lock();
            if log.state == ScopeState::Consumed {
                debug!(scope = %self.name, "Scope already consumed");
                return false;
            }
            log.state = ScopeState::Closed;
            std::mem::take(&mut log.records)
        };

        info!(scope = %self.name, records = records.len(), "Replaying scope");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            for record in records.into_iter().rev() {
                record.revert();
            }
        }));

        // A scope is single-use even when one of its inverses panicked
        self.log.lock().state = ScopeState::Consumed;
        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
        true
    }

    /// Revert every record in reverse append order on a blocking worker.
    ///
    /// ```
    /// use undoscope_core::{ChangeRecord, ScopeContext};
    ///
    /// # tokio_test::block_on(async {
    /// let ctx = ScopeContext::new();
    /// let entry = ctx.enter_or_join("Edit");
    /// ctx.record(ChangeRecord::from_fn("restore title", || {}));
    ///
    /// assert!(entry.scope.replay("Edit").await.unwrap());
    /// assert!(!ctx.is_recording());
    /// # });
    /// ```
    pub async fn replay(self: &Arc<Self>, name: &str) -> Result<bool> {
        let scope = Arc::clone(self);
        let name = name.to_string();
        tokio::task::spawn_blocking(move || scope.replay_blocking(&name))
            .await
            .map_err(|e| UndoScopeError::replay_failed(e.to_string()))
    }

    /// Close (if ambient) and drop all records without replaying them
    pub fn abandon(&self) {
        self.close(&self.name);
        let mut log = self.log.lock();
        if log.state != ScopeState::Consumed {
            warn!(scope = %self.name, records = log.records.len(), "Abandoning scope");
            log.records.clear();
            log.state = ScopeState::Consumed;
        }
    }
}

impl fmt::Debug for ChangeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let log = self.log.lock();
        f.debug_struct("ChangeScope")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &log.state)
            .field("records", &log.records.len())
            .finish()
    }
}

/// Result of [`ScopeContext::enter_or_join`]
#[derive(Debug, Clone)]
pub struct ScopeEntry {
    /// The recording scope
    pub scope: Arc<ChangeScope>,
    /// Whether the caller created the scope and is responsible for closing it
    pub owns_close: bool,
}

/// Holds the single recording scope for a group of tracked objects.
///
/// Contexts are passed explicitly to the containers that record into them.
/// Hosts that prefer implicit capture can share [`ScopeContext::global`].
pub struct ScopeContext {
    current: Mutex<Option<Arc<ChangeScope>>>,
}

static GLOBAL_CONTEXT: OnceLock<Arc<ScopeContext>> = OnceLock::new();

impl ScopeContext {
    /// Create an independent context
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(None),
        })
    }

    /// Process-wide context for hosts that want implicit capture
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_CONTEXT.get_or_init(ScopeContext::new))
    }

    /// Join the recording scope, or open one named `name` if none is recording
    pub fn enter_or_join(self: &Arc<Self>, name: impl Into<String>) -> ScopeEntry {
        let mut current = self.current.lock();
        if let Some(scope) = current.as_ref() {
            return ScopeEntry {
                scope: Arc::clone(scope),
                owns_close: false,
            };
        }

        let scope = Arc::new(ChangeScope::new(name.into(), Arc::downgrade(self)));
        debug!(scope = %scope.name, id = %scope.id, "Scope opened");
        *current = Some(Arc::clone(&scope));
        ScopeEntry {
            scope,
            owns_close: true,
        }
    }

    /// Like [`enter_or_join`](Self::enter_or_join), returning a guard that
    /// abandons an owned scope if it is dropped before [`ScopeGuard::finish`]
    pub fn begin(self: &Arc<Self>, name: impl Into<String>) -> ScopeGuard {
        ScopeGuard {
            entry: self.enter_or_join(name),
            finished: false,
        }
    }

    /// The scope currently recording, if any
    pub fn current(&self) -> Option<Arc<ChangeScope>> {
        self.current.lock().clone()
    }

    /// Whether a scope is currently recording
    pub fn is_recording(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Record into the ambient scope. Returns `false` when nothing is recording.
    pub fn record(&self, record: ChangeRecord) -> bool {
        match self.current() {
            Some(scope) => scope.record(record),
            None => false,
        }
    }

    fn is_current(&self, scope: &ChangeScope) -> bool {
        self.current
            .lock()
            .as_ref()
            .map(|current| ptr::eq(Arc::as_ptr(current), scope))
            .unwrap_or(false)
    }
}

impl fmt::Debug for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeContext")
            .field("current", &self.current().map(|s| s.name.clone()))
            .finish()
    }
}

/// RAII handle over a scope entry
pub struct ScopeGuard {
    entry: ScopeEntry,
    finished: bool,
}

impl ScopeGuard {
    /// The scope being recorded into
    pub fn scope(&self) -> &Arc<ChangeScope> {
        &self.entry.scope
    }

    /// Whether this guard opened the scope
    pub fn owns_close(&self) -> bool {
        self.entry.owns_close
    }

    /// Close the scope if this guard owns it and hand it back for committing.
    ///
    /// A joined guard returns `None`; the outer owner finishes the scope.
    pub fn finish(mut self) -> Option<Arc<ChangeScope>> {
        self.finished = true;
        if !self.entry.owns_close {
            return None;
        }
        let scope = Arc::clone(&self.entry.scope);
        scope.close(scope.name());
        Some(scope)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if !self.finished && self.entry.owns_close {
            self.entry.scope.abandon();
        }
    }
}
