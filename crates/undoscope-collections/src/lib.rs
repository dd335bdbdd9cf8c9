#![warn(missing_docs)]

//! Tracked containers for the undoscope engine
//!
//! Containers in this crate are safe to share across threads, notify
//! observers of every structural change, and record an exact inverse into
//! the recording [`ChangeScope`](undoscope_core::ChangeScope) of their
//! [`ScopeContext`](undoscope_core::ScopeContext), so replaying the scope
//! restores their prior contents.
//!
//! - [`TrackedList`] with [`TrackedQueue`] / [`TrackedStack`] views
//! - [`TrackedMap`] for keyed data
//! - [`TrackedProperty`] for a single named value

pub mod dispatch;
pub mod error;
pub mod list;
pub mod map;
pub mod notify;
pub mod property;
pub mod views;

pub use dispatch::{DispatchWork, LocalDispatcher, PresentationDispatcher, QueuedDispatcher};
pub use error::{CollectionError, ObserverError, Result};
pub use list::{ListEdit, TrackedList};
pub use map::{MapChange, MapEdit, TrackedMap};
pub use notify::{CollectionChange, ContainerOptions, ObserverResult, SubscriptionId};
pub use property::{PropertyChange, TrackedProperty};
pub use views::{TrackedQueue, TrackedStack};
