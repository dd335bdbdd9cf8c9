//! Undo/redo stack orchestration

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Result, UndoScopeError};
use crate::queue::{submit, CommandQueue, SerialWorkQueue};
use crate::scope::{ChangeScope, ScopeContext, ScopeState};

/// Why a scope was pushed onto a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeKind {
    /// A new forward action
    Do,
    /// Produced by a redo, undoable again
    Undo,
    /// Produced by an undo, redoable
    Redo,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Do => write!(f, "Do"),
            ScopeKind::Undo => write!(f, "Undo"),
            ScopeKind::Redo => write!(f, "Redo"),
        }
    }
}

/// A completed scope on one of the stacks
#[derive(Debug, Clone)]
pub struct StackEntry {
    /// The scope to replay
    pub scope: Arc<ChangeScope>,
    /// Why it was pushed (diagnostics only)
    pub kind: ScopeKind,
    /// When it was pushed
    pub committed_at: DateTime<Utc>,
}

/// Read-only view of a stack entry, top of stack first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// Scope identifier
    pub id: Uuid,
    /// Scope name
    pub name: String,
    /// Why the scope was pushed
    pub kind: ScopeKind,
    /// Number of inverse records it holds
    pub record_count: usize,
    /// When it was pushed
    pub committed_at: DateTime<Utc>,
}

impl From<&StackEntry> for HistoryItem {
    fn from(entry: &StackEntry) -> Self {
        HistoryItem {
            id: entry.scope.id(),
            name: entry.scope.name().to_string(),
            kind: entry.kind,
            record_count: entry.scope.record_count(),
            committed_at: entry.committed_at,
        }
    }
}

/// Whether undo and redo commands are currently available
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Undo stack is non-empty
    pub can_undo: bool,
    /// Redo stack is non-empty
    pub can_redo: bool,
}

#[derive(Default)]
struct Stacks {
    undo: Vec<StackEntry>,
    redo: Vec<StackEntry>,
    /// Bumped by every `Do` commit
    forward_epoch: u64,
}

impl Stacks {
    fn availability(&self) -> Availability {
        Availability {
            can_undo: !self.undo.is_empty(),
            can_redo: !self.redo.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Undo,
    Redo,
}

struct ManagerState {
    context: Arc<ScopeContext>,
    stacks: Mutex<Stacks>,
    max_undo_depth: usize,
    max_redo_depth: usize,
    availability: watch::Sender<Availability>,
}

/// Manages the undo and redo stacks of completed scopes.
///
/// Undo pops the top scope, replays it inside a freshly opened scope and
/// commits that new scope to the redo stack; the replay's own mutations are
/// what the redo will later revert. Redo is symmetric. Requests go through a
/// serialized [`CommandQueue`] so concurrent calls never interleave.
pub struct ScopeStackManager {
    state: Arc<ManagerState>,
    queue: Arc<dyn CommandQueue>,
}

impl ScopeStackManager {
    /// Create a manager with default configuration and its own worker queue
    pub fn new(context: Arc<ScopeContext>) -> Result<Self> {
        Self::with_config(context, &EngineConfig::default())
    }

    /// Create a manager honoring the depth limits in `config`
    pub fn with_config(context: Arc<ScopeContext>, config: &EngineConfig) -> Result<Self> {
        let queue = Arc::new(SerialWorkQueue::new("undoscope-stack")?);
        Ok(Self::with_queue(context, config, queue))
    }

    /// Create a manager posting onto an existing queue
    pub fn with_queue(
        context: Arc<ScopeContext>,
        config: &EngineConfig,
        queue: Arc<dyn CommandQueue>,
    ) -> Self {
        let (availability, _) = watch::channel(Availability::default());
        Self {
            state: Arc::new(ManagerState {
                context,
                stacks: Mutex::new(Stacks::default()),
                max_undo_depth: config.max_undo_depth,
                max_redo_depth: config.max_redo_depth,
                availability,
            }),
            queue,
        }
    }

    /// The context replays record into
    pub fn context(&self) -> &Arc<ScopeContext> {
        &self.state.context
    }

    /// Push a completed scope.
    ///
    /// `Do` clears the redo stack before pushing onto the undo stack. Scopes
    /// without records, or already consumed, are not pushed.
    ///
    /// Commits take the stack lock directly instead of going through the
    /// command queue. A `Do` commit that lands while an undo is replaying
    /// still wins: the undo's redo entry is discarded rather than pushed on
    /// top of the new forward action.
    pub fn commit(&self, scope: Arc<ChangeScope>, kind: ScopeKind) {
        self.state.commit(scope, kind);
    }

    /// Undo the top scope, or every scope down to and including `target`
    pub async fn undo(&self, target: Option<Arc<ChangeScope>>) -> Result<()> {
        let state = Arc::clone(&self.state);
        submit(self.queue.as_ref(), move || {
            state.run(Direction::Undo, target.as_ref())
        })
        .await?
    }

    /// Redo the top scope, or every scope down to and including `target`
    pub async fn redo(&self, target: Option<Arc<ChangeScope>>) -> Result<()> {
        let state = Arc::clone(&self.state);
        submit(self.queue.as_ref(), move || {
            state.run(Direction::Redo, target.as_ref())
        })
        .await?
    }

    /// Whether there is anything to undo
    pub fn can_undo(&self) -> bool {
        !self.state.stacks.lock().undo.is_empty()
    }

    /// Whether there is anything to redo
    pub fn can_redo(&self) -> bool {
        !self.state.stacks.lock().redo.is_empty()
    }

    /// Number of undoable scopes
    pub fn undo_count(&self) -> usize {
        self.state.stacks.lock().undo.len()
    }

    /// Number of redoable scopes
    pub fn redo_count(&self) -> usize {
        self.state.stacks.lock().redo.len()
    }

    /// Undo stack contents, most recent first
    pub fn undo_history(&self) -> Vec<HistoryItem> {
        self.state
            .stacks
            .lock()
            .undo
            .iter()
            .rev()
            .map(HistoryItem::from)
            .collect()
    }

    /// Redo stack contents, most recent first
    pub fn redo_history(&self) -> Vec<HistoryItem> {
        self.state
            .stacks
            .lock()
            .redo
            .iter()
            .rev()
            .map(HistoryItem::from)
            .collect()
    }

    /// The scope on top of the undo stack
    pub fn peek_undo(&self) -> Option<Arc<ChangeScope>> {
        self.state
            .stacks
            .lock()
            .undo
            .last()
            .map(|entry| Arc::clone(&entry.scope))
    }

    /// The scope on top of the redo stack
    pub fn peek_redo(&self) -> Option<Arc<ChangeScope>> {
        self.state
            .stacks
            .lock()
            .redo
            .last()
            .map(|entry| Arc::clone(&entry.scope))
    }

    /// Drop all history
    pub fn clear(&self) {
        let mut stacks = self.state.stacks.lock();
        stacks.undo.clear();
        stacks.redo.clear();
        self.state.publish(&stacks);
    }

    /// Receiver notified whenever undo/redo availability changes
    pub fn availability(&self) -> watch::Receiver<Availability> {
        self.state.availability.subscribe()
    }
}

impl ManagerState {
    fn commit(&self, scope: Arc<ChangeScope>, kind: ScopeKind) {
        self.commit_since(scope, kind, None);
    }

    /// Commit, dropping a `Redo` entry if a `Do` commit happened after
    /// `epoch` was observed
    fn commit_since(&self, scope: Arc<ChangeScope>, kind: ScopeKind, epoch: Option<u64>) {
        if scope.state() == ScopeState::Consumed {
            warn!(scope = %scope.name(), "Refusing to commit consumed scope");
            return;
        }
        if scope.is_empty() {
            debug!(scope = %scope.name(), kind = %kind, "Skipping empty scope");
            return;
        }

        let entry = StackEntry {
            scope,
            kind,
            committed_at: Utc::now(),
        };
        debug!(scope = %entry.scope.name(), kind = %kind, "Committing scope");

        let mut stacks = self.stacks.lock();
        if kind == ScopeKind::Redo && epoch.is_some_and(|seen| seen != stacks.forward_epoch) {
            debug!(
                scope = %entry.scope.name(),
                "Discarding redo entry superseded by a new action"
            );
            return;
        }
        match kind {
            ScopeKind::Do => {
                stacks.forward_epoch += 1;
                stacks.redo.clear();
                push_bounded(&mut stacks.undo, entry, self.max_undo_depth);
            }
            ScopeKind::Undo => push_bounded(&mut stacks.undo, entry, self.max_undo_depth),
            ScopeKind::Redo => push_bounded(&mut stacks.redo, entry, self.max_redo_depth),
        }
        self.publish(&stacks);
    }

    fn publish(&self, stacks: &Stacks) {
        self.availability.send_replace(stacks.availability());
    }

    fn pop(&self, direction: Direction) -> Option<(StackEntry, u64)> {
        let mut stacks = self.stacks.lock();
        let entry = match direction {
            Direction::Undo => stacks.undo.pop(),
            Direction::Redo => stacks.redo.pop(),
        };
        self.publish(&stacks);
        entry.map(|entry| (entry, stacks.forward_epoch))
    }

    fn push_back(&self, direction: Direction, entry: StackEntry) {
        let mut stacks = self.stacks.lock();
        match direction {
            Direction::Undo => stacks.undo.push(entry),
            Direction::Redo => stacks.redo.push(entry),
        }
        self.publish(&stacks);
    }

    /// Runs on the queue worker
    fn run(&self, direction: Direction, target: Option<&Arc<ChangeScope>>) -> Result<()> {
        let (result_kind, label) = match direction {
            Direction::Undo => (ScopeKind::Redo, "Undo"),
            Direction::Redo => (ScopeKind::Undo, "Redo"),
        };

        let mut first = true;
        loop {
            let Some((entry, epoch)) = self.pop(direction) else {
                if first {
                    return Err(match direction {
                        Direction::Undo => UndoScopeError::NoMoreUndos,
                        Direction::Redo => UndoScopeError::NoMoreRedos,
                    });
                }
                if target.is_some() {
                    debug!(op = label, "Target not found, stack drained");
                }
                return Ok(());
            };
            first = false;

            let name = format!("{}: {}", label, entry.scope.name());
            let recording = self.context.enter_or_join(name.clone());
            if !recording.owns_close {
                let busy = recording.scope.name().to_string();
                self.push_back(direction, entry);
                return Err(UndoScopeError::scope_busy(busy));
            }

            info!(op = label, scope = %entry.scope.name(), "Replaying scope");
            let replayed = panic::catch_unwind(AssertUnwindSafe(|| {
                entry.scope.replay_blocking(entry.scope.name())
            }));
            // Always release the context, and keep whatever part of the
            // replay did run so it can be reversed.
            recording.scope.close(&name);
            self.commit_since(Arc::clone(&recording.scope), result_kind, Some(epoch));

            if let Err(payload) = replayed {
                let reason = panic_reason(payload.as_ref());
                error!(op = label, scope = %entry.scope.name(), %reason, "Replay panicked");
                return Err(UndoScopeError::replay_failed(format!(
                    "{} of '{}' panicked: {}",
                    label,
                    entry.scope.name(),
                    reason
                )));
            }

            let reached = match target {
                None => true,
                Some(target) => Arc::ptr_eq(target, &entry.scope),
            };
            if reached {
                return Ok(());
            }
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn push_bounded(stack: &mut Vec<StackEntry>, entry: StackEntry, max_depth: usize) {
    stack.push(entry);
    if max_depth > 0 && stack.len() > max_depth {
        let excess = stack.len() - max_depth;
        stack.drain(..excess);
    }
}
