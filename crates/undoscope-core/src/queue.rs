//! Serialized command queue
//!
//! Undo and redo requests are posted here so that one request's
//! pop/replay/push completes before the next request observes the stacks.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::error::{Result, UndoScopeError};

/// A unit of work for the queue
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Queue that drains work strictly one item at a time
pub trait CommandQueue: Send + Sync {
    /// Post work onto the queue
    fn enqueue(&self, work: Job) -> Result<()>;
}

/// Single-worker queue backed by a dedicated thread.
///
/// The worker exits once every handle to the queue has been dropped and the
/// remaining jobs have run.
pub struct SerialWorkQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl SerialWorkQueue {
    /// Spawn the worker thread
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        thread::Builder::new().name(name.clone()).spawn(move || {
            while let Some(job) = receiver.blocking_recv() {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!(queue = %name, "Queued job panicked");
                }
            }
            debug!(queue = %name, "Command queue worker exiting");
        })?;

        Ok(Self { sender })
    }
}

impl CommandQueue for SerialWorkQueue {
    fn enqueue(&self, work: Job) -> Result<()> {
        self.sender
            .send(work)
            .map_err(|_| UndoScopeError::QueueClosed)
    }
}

/// Post `work` and wait for its result
pub async fn submit<R, F>(queue: &dyn CommandQueue, work: F) -> Result<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    queue.enqueue(Box::new(move || {
        let _ = tx.send(work());
    }))?;
    rx.await
        .map_err(|_| UndoScopeError::replay_failed("queued work did not complete"))
}
