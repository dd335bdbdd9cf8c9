//! Thread-safe, observable, undo-recording list
//!
//! Every mutation runs under one reentrant lock per list: mutate, record the
//! exact inverse into the recording scope (if tracking is on), notify. Reads
//! copy under the lock and work on the copy, so iteration never observes a
//! concurrent mutation half-applied.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use tracing::debug;
use undoscope_core::{ChangeRecord, InverseAction, ScopeContext};

use crate::error::{CollectionError, Result};
use crate::notify::{CollectionChange, ContainerOptions, Notifier, ObserverResult, SubscriptionId};
use crate::views::{TrackedQueue, TrackedStack};

/// The inverse of one list mutation
#[derive(Debug, Clone, PartialEq)]
pub enum ListEdit<T> {
    /// Put a removed item back at `index`
    Insert {
        /// Position the item was removed from
        index: usize,
        /// The removed item
        item: T,
    },
    /// Take an inserted item out again
    Remove {
        /// Position the item was inserted at
        index: usize,
        /// The inserted item
        item: T,
    },
    /// Restore the value an assignment overwrote
    Replace {
        /// Position of the assignment
        index: usize,
        /// Value before the assignment
        old: T,
        /// Value the assignment wrote
        new: T,
    },
    /// Move an item back
    Move {
        /// Current position
        from: usize,
        /// Position to restore
        to: usize,
    },
    /// Restore the entire contents
    Reset {
        /// Contents in original order
        snapshot: Vec<T>,
    },
}

impl<T> ListEdit<T> {
    fn describe(&self) -> String {
        match self {
            ListEdit::Insert { index, .. } => format!("insert at {}", index),
            ListEdit::Remove { index, .. } => format!("remove at {}", index),
            ListEdit::Replace { index, .. } => format!("replace at {}", index),
            ListEdit::Move { from, to } => format!("move {} to {}", from, to),
            ListEdit::Reset { snapshot } => format!("reset to {} items", snapshot.len()),
        }
    }
}

struct ListInverse<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    target: Weak<ListCore<T>>,
    edit: ListEdit<T>,
}

impl<T> InverseAction for ListInverse<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    fn revert(self: Box<Self>) {
        let ListInverse { target, edit } = *self;
        let Some(core) = target.upgrade() else {
            debug!("List dropped before replay, skipping inverse");
            return;
        };
        TrackedList { core }.apply_edit(edit);
    }

    fn describe(&self) -> String {
        self.edit.describe()
    }
}

/// Outcome of a single primitive mutation
struct Applied<R, T> {
    result: R,
    inverse: ListEdit<T>,
    change: CollectionChange<T>,
}

pub(crate) struct ListCore<T> {
    items: ReentrantMutex<RefCell<Vec<T>>>,
    context: Arc<ScopeContext>,
    tracking: AtomicBool,
    notifier: Notifier<CollectionChange<T>>,
}

/// A list that notifies observers and records undo information.
///
/// Cloning yields another handle to the same list. [`queue`](Self::queue)
/// and [`stack`](Self::stack) return FIFO/LIFO views over the same storage
/// and lock.
pub struct TrackedList<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    core: Arc<ListCore<T>>,
}

impl<T> Clone for TrackedList<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> TrackedList<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    /// Create an empty list recording into `context`
    pub fn new(context: Arc<ScopeContext>) -> Self {
        Self::with_options(context, Vec::new(), ContainerOptions::default())
    }

    /// Create a list with initial contents (not recorded)
    pub fn with_items(context: Arc<ScopeContext>, items: Vec<T>) -> Self {
        Self::with_options(context, items, ContainerOptions::default())
    }

    /// Create a list with explicit options
    pub fn with_options(
        context: Arc<ScopeContext>,
        items: Vec<T>,
        options: ContainerOptions,
    ) -> Self {
        Self {
            core: Arc::new(ListCore {
                items: ReentrantMutex::new(RefCell::new(items)),
                context,
                tracking: AtomicBool::new(options.tracking_enabled),
                notifier: Notifier::new(options.dispatcher),
            }),
        }
    }

    /// FIFO view over this list
    pub fn queue(&self) -> TrackedQueue<T> {
        TrackedQueue::new(self.clone())
    }

    /// LIFO view over this list
    pub fn stack(&self) -> TrackedStack<T> {
        TrackedStack::new(self.clone())
    }

    /// The scope context this list records into
    pub fn context(&self) -> &Arc<ScopeContext> {
        &self.core.context
    }

    /// Whether two handles refer to the same list
    pub fn same_list(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    // ---- mutation plumbing ----

    /// Run one primitive mutation as an atomic mutate/record/notify unit
    fn apply<R>(&self, op: impl FnOnce(&mut Vec<T>) -> Option<Applied<R, T>>) -> Option<R> {
        let guard = self.core.items.lock();
        let applied = {
            let mut items = guard.borrow_mut();
            op(&mut items)
        }?;
        self.capture(applied.inverse);
        self.core.notifier.notify(applied.change);
        drop(guard);
        Some(applied.result)
    }

    fn capture(&self, edit: ListEdit<T>) {
        if !self.core.tracking.load(Ordering::SeqCst) || !self.core.context.is_recording() {
            return;
        }
        let inverse = ListInverse {
            target: Arc::downgrade(&self.core),
            edit,
        };
        self.core
            .context
            .record(ChangeRecord::new(Box::new(inverse)).with_instance(&self.core));
    }

    fn apply_edit(&self, edit: ListEdit<T>) {
        match edit {
            ListEdit::Insert { index, item } => {
                let _guard = self.core.items.lock();
                let index = index.min(self.len());
                let _ = self.insert(index, item);
            }
            ListEdit::Remove { index, item } => {
                let _guard = self.core.items.lock();
                let index = match self.get(index) {
                    Ok(existing) if existing == item => Some(index),
                    _ => self.index_of(&item),
                };
                if let Some(index) = index {
                    self.remove_at(index);
                }
            }
            ListEdit::Replace { index, old, .. } => {
                self.set_item(index, old);
            }
            ListEdit::Move { from, to } => {
                self.move_item(from, to);
            }
            ListEdit::Reset { snapshot } => self.reset(snapshot),
        }
    }

    // ---- mutators ----

    /// Append `item`, returning its index
    pub fn add(&self, item: T) -> usize {
        self.apply(|items| {
            let index = items.len();
            items.push(item.clone());
            Some(Applied {
                result: index,
                inverse: ListEdit::Remove {
                    index,
                    item: item.clone(),
                },
                change: CollectionChange::Added { index, item },
            })
        })
        .unwrap_or_default()
    }

    /// Insert `item` at `index`
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        let guard = self.core.items.lock();
        let len = guard.borrow().len();
        if index > len {
            return Err(CollectionError::IndexOutOfRange { index, len });
        }
        self.apply(|items| {
            items.insert(index, item.clone());
            Some(Applied {
                result: (),
                inverse: ListEdit::Remove {
                    index,
                    item: item.clone(),
                },
                change: CollectionChange::Added { index, item },
            })
        });
        Ok(())
    }

    /// Insert `item` before the first occurrence of `anchor`, or append it
    /// when `anchor` is absent. Returns the index the item landed at.
    pub fn insert_before(&self, anchor: &T, item: T) -> usize {
        let _guard = self.core.items.lock();
        match self.index_of(anchor) {
            Some(index) => {
                let _ = self.insert(index, item);
                index
            }
            None => self.add(item),
        }
    }

    /// Append `item` unless an equal item is present
    pub fn add_if_new(&self, item: T) -> bool {
        let _guard = self.core.items.lock();
        if self.contains(&item) {
            return false;
        }
        self.add(item);
        true
    }

    /// Remove the first occurrence of `item`
    pub fn remove(&self, item: &T) -> bool {
        let _guard = self.core.items.lock();
        match self.index_of(item) {
            Some(index) => self.remove_at(index).is_some(),
            None => false,
        }
    }

    /// Remove the item at `index`.
    ///
    /// A stale index (the list shrank under a concurrent mutation) is a
    /// silent no-op returning `None`.
    pub fn remove_at(&self, index: usize) -> Option<T> {
        self.apply(|items| {
            if index >= items.len() {
                debug!(index, len = items.len(), "Stale index in remove_at");
                return None;
            }
            let item = items.remove(index);
            Some(Applied {
                result: item.clone(),
                inverse: ListEdit::Insert {
                    index,
                    item: item.clone(),
                },
                change: CollectionChange::Removed { index, item },
            })
        })
    }

    /// Remove the first occurrence of each item, returning how many were found
    pub fn remove_range<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let _guard = self.core.items.lock();
        items.into_iter().filter(|item| self.remove(item)).count()
    }

    /// Move the item at `old_index` so that it ends up at `new_index`.
    ///
    /// `[A,B,C,D,E].move_item(0, 3)` yields `[B,C,D,A,E]`. Stale indices are a
    /// silent no-op returning `false`.
    pub fn move_item(&self, old_index: usize, new_index: usize) -> bool {
        if old_index == new_index {
            return old_index < self.len();
        }
        self.apply(|items| {
            let len = items.len();
            if old_index >= len || new_index >= len {
                debug!(old_index, new_index, len, "Stale index in move_item");
                return None;
            }
            // The destination is a final position, so inserting after the
            // removal already accounts for the shift when moving forward.
            let item = items.remove(old_index);
            items.insert(new_index, item.clone());
            Some(Applied {
                result: (),
                inverse: ListEdit::Move {
                    from: new_index,
                    to: old_index,
                },
                change: CollectionChange::Moved {
                    from: old_index,
                    to: new_index,
                    item,
                },
            })
        })
        .is_some()
    }

    /// Replace the item at `index`, returning the prior value.
    ///
    /// A stale index is a silent no-op returning `None`.
    pub fn set_item(&self, index: usize, item: T) -> Option<T> {
        self.apply(|items| {
            let Some(slot) = items.get_mut(index) else {
                debug!(index, "Stale index in set_item");
                return None;
            };
            let old = std::mem::replace(slot, item.clone());
            Some(Applied {
                result: old.clone(),
                inverse: ListEdit::Replace {
                    index,
                    old: old.clone(),
                    new: item.clone(),
                },
                change: CollectionChange::Replaced {
                    index,
                    old,
                    new: item,
                },
            })
        })
    }

    /// Remove everything. The inverse restores the pre-clear contents in order.
    pub fn clear(&self) {
        self.apply(|items| {
            if items.is_empty() {
                return None;
            }
            let snapshot = std::mem::take(items);
            Some(Applied {
                result: (),
                inverse: ListEdit::Reset { snapshot },
                change: CollectionChange::Reset,
            })
        });
    }

    /// Replace the entire contents
    pub fn reset(&self, contents: Vec<T>) {
        self.apply(|items| {
            let snapshot = std::mem::replace(items, contents);
            Some(Applied {
                result: (),
                inverse: ListEdit::Reset { snapshot },
                change: CollectionChange::Reset,
            })
        });
    }

    pub(crate) fn pop_front(&self) -> Option<T> {
        self.remove_at(0)
    }

    pub(crate) fn pop_back(&self) -> Option<T> {
        let _guard = self.core.items.lock();
        let len = self.len();
        if len == 0 {
            return None;
        }
        self.remove_at(len - 1)
    }

    // ---- reads ----

    /// Bounds-checked read of the item at `index`
    pub fn get(&self, index: usize) -> Result<T> {
        let guard = self.core.items.lock();
        let items = guard.borrow();
        items
            .get(index)
            .cloned()
            .ok_or(CollectionError::IndexOutOfRange {
                index,
                len: items.len(),
            })
    }

    /// Last item, if any
    pub fn last(&self) -> Option<T> {
        self.core.items.lock().borrow().last().cloned()
    }

    /// Whether an equal item is present
    pub fn contains(&self, item: &T) -> bool {
        self.core.items.lock().borrow().contains(item)
    }

    /// Index of the first equal item
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.core
            .items
            .lock()
            .borrow()
            .iter()
            .position(|existing| existing == item)
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.core.items.lock().borrow().len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents
    pub fn to_snapshot(&self) -> Vec<T> {
        self.core.items.lock().borrow().clone()
    }

    /// Iterate over a snapshot; never invalidated by concurrent mutation
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_snapshot().into_iter()
    }

    // ---- notifications & tracking ----

    /// Register an observer for structural changes
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&CollectionChange<T>) -> ObserverResult + Send + Sync + 'static,
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
            .set_suspended(suspended, || CollectionChange::Reset);
    }

    /// Whether notifications are currently buffered
    pub fn notifications_suspended(&self) -> bool {
        self.core.notifier.is_suspended()
    }

    /// Enable or disable inverse recording
    pub fn set_tracking_enabled(&self, enabled: bool) {
        self.core.tracking.store(enabled, Ordering::SeqCst);
    }

    /// Whether inverse recording is enabled
    pub fn is_tracking_enabled(&self) -> bool {
        self.core.tracking.load(Ordering::SeqCst)
    }
}

impl<T> fmt::Debug for TrackedList<T>
where
    T: Clone + PartialEq + Send + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_snapshot()).finish()
    }
}

impl<'a, T> IntoIterator for &'a TrackedList<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn letters(ctx: &Arc<ScopeContext>, s: &str) -> TrackedList<char> {
        TrackedList::with_items(Arc::clone(ctx), s.chars().collect())
    }

    fn text(list: &TrackedList<char>) -> String {
        list.iter().collect()
    }

    #[test]
    fn test_move_forward_and_back() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "ABCDE");

        let entry = ctx.enter_or_join("Move");
        assert!(list.move_item(0, 3));
        assert_eq!(text(&list), "BCDAE");
        assert_eq!(entry.scope.descriptions(), vec!["move 3 to 0"]);

        entry.scope.replay_blocking("Move");
        assert_eq!(text(&list), "ABCDE");
    }

    #[test]
    fn test_move_adjacent_round_trip() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "ABCDE");

        let entry = ctx.enter_or_join("Swap");
        list.move_item(1, 2);
        assert_eq!(text(&list), "ACBDE");
        list.move_item(3, 2);
        assert_eq!(text(&list), "ACDBE");

        entry.scope.replay_blocking("Swap");
        assert_eq!(text(&list), "ABCDE");
    }

    #[test]
    fn test_move_stale_index_is_noop() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "AB");
        assert!(!list.move_item(0, 5));
        assert!(list.move_item(1, 1));
        assert_eq!(text(&list), "AB");
    }

    #[test]
    fn test_inverse_descriptions_are_inspectable() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "ABC");

        let entry = ctx.enter_or_join("Edit");
        list.add('D');
        list.remove_at(0);
        list.set_item(0, 'X');
        list.clear();

        assert_eq!(
            entry.scope.descriptions(),
            vec!["remove at 3", "insert at 0", "replace at 0", "reset to 3 items"]
        );
    }

    #[test]
    fn test_replay_restores_every_mutation_kind() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "ABC");

        let entry = ctx.enter_or_join("Everything");
        list.add('D');
        list.insert(1, 'Z').unwrap();
        list.insert_before(&'C', 'Y');
        list.remove(&'A');
        list.remove_range(vec!['B', 'Q']);
        list.set_item(0, 'W');
        list.add_if_new('D');
        list.add_if_new('E');
        list.move_item(0, 2);
        list.clear();
        list.add('K');
        assert_eq!(text(&list), "K");

        entry.scope.replay_blocking("Everything");
        assert_eq!(text(&list), "ABC");
    }

    #[test]
    fn test_duplicate_items_restore_exact_order() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "XAX");

        let entry = ctx.enter_or_join("Dup");
        list.add('X');
        entry.scope.replay_blocking("Dup");
        assert_eq!(text(&list), "XAX");
    }

    #[test]
    fn test_stale_indices_are_lenient() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "AB");
        let entry = ctx.enter_or_join("Stale");

        assert_eq!(list.remove_at(9), None);
        assert_eq!(list.set_item(9, 'Z'), None);
        assert!(entry.scope.is_empty());
        assert_eq!(text(&list), "AB");
    }

    #[test]
    fn test_bounds_checked_reads_and_inserts() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "AB");
        assert_eq!(list.get(1), Ok('B'));
        assert_eq!(
            list.get(2),
            Err(CollectionError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            list.insert(3, 'C'),
            Err(CollectionError::IndexOutOfRange { index: 3, len: 2 })
        );
    }

    #[test]
    fn test_tracking_disabled_records_nothing() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "A");
        list.set_tracking_enabled(false);

        let entry = ctx.enter_or_join("Quiet");
        list.add('B');
        assert!(entry.scope.is_empty());
    }

    #[test]
    fn test_no_scope_records_nothing() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "A");
        list.add('B');
        assert!(ctx.current().is_none());
        assert_eq!(text(&list), "AB");
    }

    #[test]
    fn test_notifications_per_mutation() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "AB");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        list.subscribe(move |change: &CollectionChange<char>| {
            s.lock().push(change.clone());
            Ok(())
        });

        list.add('C');
        list.move_item(2, 0);
        list.remove_at(1);

        assert_eq!(
            *seen.lock(),
            vec![
                CollectionChange::Added { index: 2, item: 'C' },
                CollectionChange::Moved { from: 2, to: 0, item: 'C' },
                CollectionChange::Removed { index: 1, item: 'A' },
            ]
        );
    }

    #[test]
    fn test_observer_can_read_list_during_notification() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "");
        let counts = Arc::new(Mutex::new(Vec::new()));
        let reader = list.clone();
        let c = Arc::clone(&counts);
        list.subscribe(move |_: &CollectionChange<char>| {
            c.lock().push(reader.len());
            Ok(())
        });

        list.add('A');
        list.add('B');
        assert_eq!(*counts.lock(), vec![1, 2]);
    }

    #[test]
    fn test_suspended_notifications_collapse() {
        let ctx = ScopeContext::new();
        let list = letters(&ctx, "");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        list.subscribe(move |change: &CollectionChange<char>| {
            s.lock().push(change.clone());
            Ok(())
        });

        list.set_notifications_suspended(true);
        assert!(list.notifications_suspended());
        for c in "XYZ".chars() {
            list.add(c);
        }
        assert!(seen.lock().is_empty());

        list.set_notifications_suspended(false);
        assert_eq!(*seen.lock(), vec![CollectionChange::Reset]);
        assert_eq!(text(&list), "XYZ");
    }

    #[test]
    fn test_replay_after_list_dropped_is_skipped() {
        let ctx = ScopeContext::new();
        let entry = ctx.enter_or_join("Gone");
        {
            let list = letters(&ctx, "A");
            list.add('B');
        }
        assert_eq!(entry.scope.record_count(), 1);
        assert!(entry.scope.replay_blocking("Gone"));
    }
}
