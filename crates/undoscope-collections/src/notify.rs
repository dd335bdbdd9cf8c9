//! Change notifications shared by every tracked container
//!
//! Notifications fire eagerly per mutation. While suspended they are counted
//! instead, and resuming collapses them into one reset notification.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};
use undoscope_core::EngineConfig;

use crate::dispatch::{LocalDispatcher, PresentationDispatcher};
use crate::error::ObserverError;

/// Structural change to a list-like container
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionChange<T> {
    /// `item` now sits at `index`
    Added {
        /// Position of the new item
        index: usize,
        /// The new item
        item: T,
    },
    /// `item` was removed from `index`
    Removed {
        /// Former position
        index: usize,
        /// The removed item
        item: T,
    },
    /// The item at `index` was replaced
    Replaced {
        /// Position of the replaced item
        index: usize,
        /// Prior value
        old: T,
        /// Current value
        new: T,
    },
    /// `item` moved from `from` to `to`
    Moved {
        /// Prior position
        from: usize,
        /// Current position
        to: usize,
        /// The moved item
        item: T,
    },
    /// Contents changed wholesale; observers should re-read everything
    Reset,
}

/// What an observer returns
pub type ObserverResult = std::result::Result<(), ObserverError>;

type ObserverFn<E> = Arc<dyn Fn(&E) -> ObserverResult + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Construction options shared by tracked containers
#[derive(Clone)]
pub struct ContainerOptions {
    /// Where observer callbacks run
    pub dispatcher: Arc<dyn PresentationDispatcher>,
    /// Whether mutations record inverses while a scope is recording
    pub tracking_enabled: bool,
}

impl ContainerOptions {
    /// Options honoring `track_by_default` from the engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            tracking_enabled: config.track_by_default,
            ..Self::default()
        }
    }

    /// Replace the dispatcher
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn PresentationDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            dispatcher: Arc::new(LocalDispatcher),
            tracking_enabled: true,
        }
    }
}

/// Counts notifications marshaled but not yet delivered
struct DrainGate {
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl DrainGate {
    fn enter(self: &Arc<Self>) -> InFlight {
        *self.in_flight.lock() += 1;
        InFlight(Arc::clone(self))
    }

    fn count(&self) -> usize {
        *self.in_flight.lock()
    }

    fn wait_idle_for(&self, timeout: Duration) {
        let mut in_flight = self.in_flight.lock();
        if *in_flight > 0 {
            self.idle.wait_for(&mut in_flight, timeout);
        }
    }
}

struct InFlight(Arc<DrainGate>);

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut in_flight = self.0.in_flight.lock();
        *in_flight -= 1;
        if *in_flight == 0 {
            self.0.idle.notify_all();
        }
    }
}

#[derive(Default)]
struct Suspension {
    suspended: bool,
    pending: usize,
}

pub(crate) struct Notifier<E> {
    observers: Mutex<Vec<(SubscriptionId, ObserverFn<E>)>>,
    next_id: AtomicU64,
    dispatcher: Arc<dyn PresentationDispatcher>,
    suspension: Mutex<Suspension>,
    gate: Arc<DrainGate>,
}

impl<E> Notifier<E>
where
    E: Send + 'static,
{
    pub(crate) fn new(dispatcher: Arc<dyn PresentationDispatcher>) -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            dispatcher,
            suspension: Mutex::new(Suspension::default()),
            gate: Arc::new(DrainGate {
                in_flight: Mutex::new(0),
                idle: Condvar::new(),
            }),
        }
    }

    pub(crate) fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&E) -> ObserverResult + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push((id, Arc::new(observer)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.suspension.lock().suspended
    }

    /// Deliver `event`, or count it while suspended
    pub(crate) fn notify(&self, event: E) {
        {
            let mut suspension = self.suspension.lock();
            if suspension.suspended {
                suspension.pending += 1;
                return;
            }
        }

        let observers: Vec<ObserverFn<E>> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        if observers.is_empty() {
            return;
        }

        if self.dispatcher.is_on_presentation_thread() {
            deliver(&observers, &event);
        } else {
            let in_flight = self.gate.enter();
            self.dispatcher.run_on_presentation_thread(Box::new(move || {
                deliver(&observers, &event);
                drop(in_flight);
            }));
        }
    }

    /// Suspend or resume delivery.
    ///
    /// Resuming first lets already-marshaled notifications drain, then
    /// delivers `reset()` once if anything was buffered.
    pub(crate) fn set_suspended(&self, suspended: bool, reset: impl FnOnce() -> E) {
        if suspended {
            self.suspension.lock().suspended = true;
            return;
        }

        self.drain();
        let pending = {
            let mut suspension = self.suspension.lock();
            suspension.suspended = false;
            std::mem::take(&mut suspension.pending)
        };
        if pending > 0 {
            debug!(pending, "Collapsing buffered notifications into reset");
            self.notify(reset());
        }
    }

    fn drain(&self) {
        while self.gate.count() > 0 {
            if self.dispatcher.is_on_presentation_thread() {
                self.dispatcher.pump_pending_work();
            }
            self.gate.wait_idle_for(Duration::from_millis(10));
        }
    }
}

fn deliver<E>(observers: &[ObserverFn<E>], event: &E) {
    for observer in observers {
        match panic::catch_unwind(AssertUnwindSafe(|| observer(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Observer failed"),
            Err(_) => error!("Observer panicked"),
        }
    }
}
