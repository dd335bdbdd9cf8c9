//! FIFO and LIFO views over a tracked list
//!
//! Views share the list's storage, lock, observers and tracking state;
//! they only change which end items are taken from.

use crate::error::{CollectionError, Result};
use crate::list::TrackedList;

/// First-in, first-out view: enqueue at the back, dequeue from the front
#[derive(Clone)]
pub struct TrackedQueue<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    list: TrackedList<T>,
}

impl<T> TrackedQueue<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub(crate) fn new(list: TrackedList<T>) -> Self {
        Self { list }
    }

    /// The underlying list
    pub fn list(&self) -> &TrackedList<T> {
        &self.list
    }

    /// Add `item` at the back
    pub fn enqueue(&self, item: T) {
        self.list.add(item);
    }

    /// Take the front item, failing on an empty queue
    pub fn dequeue(&self) -> Result<T> {
        self.list.pop_front().ok_or(CollectionError::EmptyContainer)
    }

    /// Take the front item if there is one
    pub fn try_dequeue(&self) -> Option<T> {
        self.list.pop_front()
    }

    /// Front item without removing it
    pub fn peek(&self) -> Option<T> {
        self.list.get(0).ok()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// Last-in, first-out view: push and pop at the back
#[derive(Clone)]
pub struct TrackedStack<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    list: TrackedList<T>,
}

impl<T> TrackedStack<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub(crate) fn new(list: TrackedList<T>) -> Self {
        Self { list }
    }

    /// The underlying list
    pub fn list(&self) -> &TrackedList<T> {
        &self.list
    }

    /// Push `item` on top
    pub fn push(&self, item: T) {
        self.list.add(item);
    }

    /// Take the top item, failing on an empty stack
    pub fn pop(&self) -> Result<T> {
        self.list.pop_back().ok_or(CollectionError::EmptyContainer)
    }

    /// Take the top item if there is one
    pub fn try_pop(&self) -> Option<T> {
        self.list.pop_back()
    }

    /// Top item without removing it
    pub fn peek(&self) -> Option<T> {
        self.list.last()
    }

    /// Number of stacked items
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the stack is empty
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
