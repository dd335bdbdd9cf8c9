//! Presentation-thread marshaling
//!
//! Containers consult a [`PresentationDispatcher`] only to decide whether a
//! notification must hop to another thread before observers run. Hosts
//! without a UI thread use [`LocalDispatcher`].

use std::collections::VecDeque;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

/// Work marshaled onto the presentation thread
pub type DispatchWork = Box<dyn FnOnce() + Send + 'static>;

/// Host-provided access to the thread observers expect to run on
pub trait PresentationDispatcher: Send + Sync {
    /// Run `work` on the presentation thread, now or later
    fn run_on_presentation_thread(&self, work: DispatchWork);

    /// Whether the caller is already on the presentation thread
    fn is_on_presentation_thread(&self) -> bool;

    /// Run work queued for the presentation thread, if called from it
    fn pump_pending_work(&self);
}

/// Dispatcher for hosts without a presentation thread: everything runs inline
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDispatcher;

impl PresentationDispatcher for LocalDispatcher {
    fn run_on_presentation_thread(&self, work: DispatchWork) {
        work()
    }

    fn is_on_presentation_thread(&self) -> bool {
        true
    }

    fn pump_pending_work(&self) {}
}

/// Dispatcher that treats the creating thread as the presentation thread.
///
/// Work posted from other threads is queued until the owner calls
/// [`pump_pending_work`](PresentationDispatcher::pump_pending_work), the way
/// a UI event loop drains its message queue.
pub struct QueuedDispatcher {
    owner: ThreadId,
    pending: Mutex<VecDeque<DispatchWork>>,
}

impl QueuedDispatcher {
    /// Bind to the calling thread
    pub fn new() -> Self {
        Self {
            owner: thread::current().id(),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of queued work items
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for QueuedDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationDispatcher for QueuedDispatcher {
    fn run_on_presentation_thread(&self, work: DispatchWork) {
        if self.is_on_presentation_thread() {
            work();
        } else {
            self.pending.lock().push_back(work);
        }
    }

    fn is_on_presentation_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn pump_pending_work(&self) {
        if !self.is_on_presentation_thread() {
            return;
        }
        loop {
            let next = self.pending.lock().pop_front();
            match next {
                Some(work) => work(),
                None => break,
            }
        }
    }
}
