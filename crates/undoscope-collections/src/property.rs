//! A single named value whose changes are undoable

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use tracing::debug;
use undoscope_core::{ChangeRecord, InverseAction, ScopeContext};

use crate::notify::{ContainerOptions, Notifier, ObserverResult, SubscriptionId};

/// Notification emitted by a [`TrackedProperty`]
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyChange<T> {
    /// The value changed
    Changed {
        /// Prior value
        old: T,
        /// Current value
        new: T,
    },
    /// Several changes happened while notifications were suspended
    Reset,
}

struct PropertyCore<T> {
    name: String,
    value: ReentrantMutex<RefCell<T>>,
    context: Arc<ScopeContext>,
    tracking: AtomicBool,
    notifier: Notifier<PropertyChange<T>>,
}

struct RestoreValue<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    target: Weak<PropertyCore<T>>,
    old: T,
}

impl<T> InverseAction for RestoreValue<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    fn revert(self: Box<Self>) {
        let RestoreValue { target, old } = *self;
        match target.upgrade() {
            Some(core) => {
                TrackedProperty { core }.set(old);
            }
            None => debug!("Property dropped before replay, skipping inverse"),
        }
    }

    fn describe(&self) -> String {
        "restore value".to_string()
    }
}

/// Named value that records its prior value whenever it is set
pub struct TrackedProperty<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    core: Arc<PropertyCore<T>>,
}

impl<T> Clone for TrackedProperty<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> TrackedProperty<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    /// Create a property named `name` holding `initial`
    pub fn new(context: Arc<ScopeContext>, name: impl Into<String>, initial: T) -> Self {
        Self::with_options(context, name, initial, ContainerOptions::default())
    }

    /// Create a property with explicit options
    pub fn with_options(
        context: Arc<ScopeContext>,
        name: impl Into<String>,
        initial: T,
        options: ContainerOptions,
    ) -> Self {
        Self {
            core: Arc::new(PropertyCore {
                name: name.into(),
                value: ReentrantMutex::new(RefCell::new(initial)),
                context,
                tracking: AtomicBool::new(options.tracking_enabled),
                notifier: Notifier::new(options.dispatcher),
            }),
        }
    }

    /// Property name attached to recorded changes
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Current value
    pub fn get(&self) -> T {
        self.core.value.lock().borrow().clone()
    }

    /// Set the value. Setting an equal value is a no-op.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        let guard = self.core.value.lock();
        let old = {
            let mut current = guard.borrow_mut();
            if *current == value {
                return false;
            }
            std::mem::replace(&mut *current, value.clone())
        };

        if self.core.tracking.load(Ordering::SeqCst) && self.core.context.is_recording() {
            let inverse = RestoreValue {
                target: Arc::downgrade(&self.core),
                old: old.clone(),
            };
            self.core.context.record(
                ChangeRecord::new(Box::new(inverse))
                    .with_property(self.core.name.clone())
                    .with_instance(&self.core),
            );
        }
        self.core
            .notifier
            .notify(PropertyChange::Changed { old, new: value });
        true
    }

    /// Register an observer
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&PropertyChange<T>) -> ObserverResult + Send + Sync + 'static,
    {
        self.core.notifier.subscribe(observer)
    }

    /// Remove an observer
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.notifier.unsubscribe(id)
    }

    /// Buffer notifications, or resume and emit one reset for everything buffered
    pub fn set_notifications_suspended(&self, suspended: bool) {
        self.core
            .notifier
            .set_suspended(suspended, || PropertyChange::Reset);
    }

    /// Enable or disable inverse recording
    pub fn set_tracking_enabled(&self, enabled: bool) {
        self.core.tracking.store(enabled, Ordering::SeqCst);
    }
}
