//! Dictionary-like tracked container

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use tracing::debug;
use undoscope_core::{ChangeRecord, InverseAction, ScopeContext};

use crate::notify::{ContainerOptions, Notifier, ObserverResult, SubscriptionId};

/// Structural change to a tracked map
#[derive(Debug, Clone, PartialEq)]
pub enum MapChange<K, V> {
    /// A new key was inserted
    Inserted {
        /// Inserted key
        key: K,
        /// Its value
        value: V,
    },
    /// An existing key got a new value
    Replaced {
        /// The key
        key: K,
        /// Prior value
        old: V,
        /// Current value
        new: V,
    },
    /// A key was removed
    Removed {
        /// Removed key
        key: K,
        /// Its last value
        value: V,
    },
    /// Contents changed wholesale
    Reset,
}

/// The inverse of one map mutation
#[derive(Debug, Clone)]
pub enum MapEdit<K, V> {
    /// Put a removed `key` back with `value`
    Insert {
        /// Key to restore
        key: K,
        /// Value to restore
        value: V,
    },
    /// Remove a key that was newly inserted
    Remove {
        /// Key to remove
        key: K,
    },
    /// Restore the value a replacement overwrote
    Replace {
        /// The key
        key: K,
        /// Value before the replacement
        old: V,
    },
    /// Restore the entire contents
    Reset {
        /// Entries before the mutation
        snapshot: HashMap<K, V>,
    },
}

struct MapInverse<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    target: Weak<MapCore<K, V>>,
    edit: MapEdit<K, V>,
}

impl<K, V> InverseAction for MapInverse<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn revert(self: Box<Self>) {
        let MapInverse { target, edit } = *self;
        let Some(core) = target.upgrade() else {
            debug!("Map dropped before replay, skipping inverse");
            return;
        };
        let map = TrackedMap { core };
        match edit {
            MapEdit::Insert { key, value } | MapEdit::Replace { key, old: value } => {
                map.insert(key, value);
            }
            MapEdit::Remove { key } => {
                map.remove(&key);
            }
            MapEdit::Reset { snapshot } => map.reset(snapshot),
        }
    }

    fn describe(&self) -> String {
        match &self.edit {
            MapEdit::Insert { .. } => "restore entry".to_string(),
            MapEdit::Remove { .. } => "remove entry".to_string(),
            MapEdit::Replace { .. } => "restore value".to_string(),
            MapEdit::Reset { snapshot } => format!("reset to {} entries", snapshot.len()),
        }
    }
}

struct MapCore<K, V> {
    entries: ReentrantMutex<RefCell<HashMap<K, V>>>,
    context: Arc<ScopeContext>,
    tracking: AtomicBool,
    notifier: Notifier<MapChange<K, V>>,
}

/// A hash map that notifies observers and records undo information
pub struct TrackedMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    core: Arc<MapCore<K, V>>,
}

impl<K, V> Clone for TrackedMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K, V> TrackedMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Create an empty map recording into `context`
    pub fn new(context: Arc<ScopeContext>) -> Self {
        Self::with_options(context, HashMap::new(), ContainerOptions::default())
    }

    /// Create a map with initial entries (not recorded) and explicit options
    pub fn with_options(
        context: Arc<ScopeContext>,
        entries: HashMap<K, V>,
        options: ContainerOptions,
    ) -> Self {
        Self {
            core: Arc::new(MapCore {
                entries: ReentrantMutex::new(RefCell::new(entries)),
                context,
                tracking: AtomicBool::new(options.tracking_enabled),
                notifier: Notifier::new(options.dispatcher),
            }),
        }
    }

    fn commit(&self, edit: MapEdit<K, V>, change: MapChange<K, V>) {
        if self.core.tracking.load(Ordering::SeqCst) && self.core.context.is_recording() {
            let inverse = MapInverse {
                target: Arc::downgrade(&self.core),
                edit,
            };
            self.core
                .context
                .record(ChangeRecord::new(Box::new(inverse)).with_instance(&self.core));
        }
        self.core.notifier.notify(change);
    }

    /// Insert or replace, returning the prior value
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let guard = self.core.entries.lock();
        let old = guard.borrow_mut().insert(key.clone(), value.clone());
        match &old {
            Some(previous) => self.commit(
                MapEdit::Replace {
                    key: key.clone(),
                    old: previous.clone(),
                },
                MapChange::Replaced {
                    key,
                    old: previous.clone(),
                    new: value,
                },
            ),
            None => self.commit(
                MapEdit::Remove { key: key.clone() },
                MapChange::Inserted { key, value },
            ),
        }
        old
    }

    /// Remove `key`, returning its value
    pub fn remove(&self, key: &K) -> Option<V> {
        let guard = self.core.entries.lock();
        let removed = guard.borrow_mut().remove(key)?;
        self.commit(
            MapEdit::Insert {
                key: key.clone(),
                value: removed.clone(),
            },
            MapChange::Removed {
                key: key.clone(),
                value: removed.clone(),
            },
        );
        Some(removed)
    }

    /// Remove every entry
    pub fn clear(&self) {
        let guard = self.core.entries.lock();
        let snapshot = std::mem::take(&mut *guard.borrow_mut());
        if snapshot.is_empty() {
            return;
        }
        self.commit(MapEdit::Reset { snapshot }, MapChange::Reset);
    }

    /// Replace the entire contents
    pub fn reset(&self, entries: HashMap<K, V>) {
        let guard = self.core.entries.lock();
        let snapshot = std::mem::replace(&mut *guard.borrow_mut(), entries);
        self.commit(MapEdit::Reset { snapshot }, MapChange::Reset);
    }

    /// Value for `key`
    pub fn get(&self, key: &K) -> Option<V> {
        self.core.entries.lock().borrow().get(key).cloned()
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &K) -> bool {
        self.core.entries.lock().borrow().contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.core.entries.lock().borrow().len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the keys
    pub fn keys(&self) -> Vec<K> {
        self.core.entries.lock().borrow().keys().cloned().collect()
    }

    /// Copy of the current entries
    pub fn to_snapshot(&self) -> HashMap<K, V> {
        self.core.entries.lock().borrow().clone()
    }

    /// Register an observer
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&MapChange<K, V>) -> ObserverResult + Send + Sync + 'static,
    {
        self.core.notifier.subscribe(observer)
    }

    /// Remove an observer
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.notifier.unsubscribe(id)
    }

    /// Buffer notifications, or resume and emit one reset for everything buffered
    pub fn set_notifications_suspended(&self, suspended: bool) {
        self.core.notifier.set_suspended(suspended, || MapChange::Reset);
    }

    /// Enable or disable inverse recording
    pub fn set_tracking_enabled(&self, enabled: bool) {
        self.core.tracking.store(enabled, Ordering::SeqCst);
    }

    /// Whether mutations currently record inverses
    pub fn is_tracking_enabled(&self) -> bool {
        self.core.tracking.load(Ordering::SeqCst)
    }
}
