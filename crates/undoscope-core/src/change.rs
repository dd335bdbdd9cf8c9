//! Change records and the inverse actions they carry

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// An operation that undoes exactly one captured mutation.
///
/// Inverse actions are consumed when reverted. Reverting an action mutates the
/// tracked target through its normal API, so a replay running inside a fresh
/// scope captures the complementary action automatically.
pub trait InverseAction: Send + 'static {
    /// Apply the inverse to its target
    fn revert(self: Box<Self>);

    /// Human-readable description used in logs and history views
    fn describe(&self) -> String;
}

/// Adapter turning a closure into an [`InverseAction`].
///
/// Use this for host state that is not held in a tracked container.
pub struct ClosureInverse<F> {
    description: String,
    action: F,
}

impl<F> ClosureInverse<F>
where
    F: FnOnce() + Send + 'static,
{
    /// Wrap `action` with a description
    pub fn new(description: impl Into<String>, action: F) -> Self {
        Self {
            description: description.into(),
            action,
        }
    }
}

impl<F> InverseAction for ClosureInverse<F>
where
    F: FnOnce() + Send + 'static,
{
    fn revert(self: Box<Self>) {
        (self.action)()
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Back-reference to the instance a record was captured from.
///
/// Diagnostics only: the reference never keeps the instance alive.
pub type InstanceRef = Weak<dyn Any + Send + Sync>;

/// The captured inverse of a single mutation
pub struct ChangeRecord {
    property_name: Option<String>,
    instance: Option<InstanceRef>,
    inverse: Box<dyn InverseAction>,
}

impl ChangeRecord {
    /// Create a record around an inverse action
    pub fn new(inverse: Box<dyn InverseAction>) -> Self {
        Self {
            property_name: None,
            instance: None,
            inverse,
        }
    }

    /// Create a record from a closure
    pub fn from_fn<F>(description: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::new(Box::new(ClosureInverse::new(description, action)))
    }

    /// Attach the name of the property that changed
    pub fn with_property(mut self, property_name: impl Into<String>) -> Self {
        self.property_name = Some(property_name.into());
        self
    }

    /// Attach a weak reference to the changed instance
    pub fn with_instance<T: Any + Send + Sync>(mut self, instance: &Arc<T>) -> Self {
        let strong: Arc<dyn Any + Send + Sync> = instance.clone();
        self.instance = Some(Arc::downgrade(&strong));
        self
    }

    /// Name of the property that changed, if any
    pub fn property_name(&self) -> Option<&str> {
        self.property_name.as_deref()
    }

    /// Whether the instance this record was captured from is still alive
    pub fn instance_alive(&self) -> bool {
        self.instance
            .as_ref()
            .map(|weak| weak.strong_count() > 0)
            .unwrap_or(false)
    }

    /// Description of the inverse action
    pub fn describe(&self) -> String {
        match &self.property_name {
            Some(property) => format!("{}: {}", property, self.inverse.describe()),
            None => self.inverse.describe(),
        }
    }

    /// Consume the record, applying its inverse
    pub fn revert(self) {
        self.inverse.revert();
    }
}

impl fmt::Debug for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRecord")
            .field("property_name", &self.property_name)
            .field("instance_alive", &self.instance_alive())
            .field("inverse", &self.inverse.describe())
            .finish()
    }
}
