//! Contracts the observer tree consumes from the host object graph.
//!
//! The observer never mutates the graph. It only enumerates declared
//! properties, reads current values and subscribes to change notifications
//! raised by objects, lists, animatable slots and easings.

use std::fmt;
use std::sync::Arc;

use crate::value::{ObjectId, SlotRef, Value};
use crate::Result;

pub type PropertyId = u32;

/// A declared property of a composite type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyDescriptor {
    pub id: PropertyId,
    pub name: Arc<str>,
    /// Untracked properties never get a child node and their changes are ignored.
    pub tracked: bool,
}

impl PropertyDescriptor {
    pub fn new(id: PropertyId, name: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            name: name.into(),
            tracked: true,
        }
    }

    pub fn untracked(mut self) -> Self {
        self.tracked = false;
        self
    }
}

/// Enumerates declared properties per type.
pub trait PropertyRegistry: Send + Sync {
    /// Stable across calls for a given type.
    fn declared_properties(&self, type_name: &str) -> Result<Vec<PropertyDescriptor>>;

    /// The reserved hierarchical-parent back-reference. Excluded by id, never by name.
    fn parent_property(&self) -> PropertyId;
}

/// Handle to a notification subscription. Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription that holds nothing.
    pub fn empty() -> Self {
        Self { unsubscribe: None }
    }

    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }

    /// Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Payload of an object's "property changed" notification.
#[derive(Debug, Clone)]
pub struct PropertyChange {
    pub property: PropertyDescriptor,
    pub old_value: Value,
    pub new_value: Value,
}

pub type PropertyChangedHandler = Arc<dyn Fn(&PropertyChange) + Send + Sync>;

/// A composite object with declared properties.
pub trait ObservableObject: Send + Sync {
    fn id(&self) -> ObjectId;

    /// Key into the [`PropertyRegistry`].
    fn type_name(&self) -> &str;

    fn get_value(&self, property: &PropertyDescriptor) -> Result<Value>;

    fn subscribe_property_changed(&self, handler: PropertyChangedHandler) -> Subscription;

    /// The single value slot of a node item, if this object is one.
    fn node_item(&self) -> Option<SlotRef> {
        None
    }
}

/// The canonical collection-change notifications.
#[derive(Debug, Clone)]
pub enum CollectionChange {
    Add {
        index: usize,
        items: Vec<Value>,
    },
    Remove {
        index: usize,
        items: Vec<Value>,
    },
    Move {
        old_index: usize,
        new_index: usize,
        count: usize,
    },
    Replace {
        index: usize,
        old_items: Vec<Value>,
        new_items: Vec<Value>,
    },
    /// Content changed wholesale without an item list.
    Reset,
}

pub type CollectionChangedHandler = Arc<dyn Fn(&CollectionChange) + Send + Sync>;

pub trait ObservableList: Send + Sync {
    fn id(&self) -> ObjectId;

    /// Snapshot of the current elements, used for the attach-time scan.
    fn items(&self) -> Vec<Value>;

    fn subscribe_collection_changed(&self, handler: CollectionChangedHandler) -> Subscription;
}

/// One independently observable aspect of an animatable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotAspect {
    CurrentValue,
    Animation,
    Expression,
}

impl SlotAspect {
    pub fn name(self) -> &'static str {
        match self {
            SlotAspect::CurrentValue => "CurrentValue",
            SlotAspect::Animation => "Animation",
            SlotAspect::Expression => "Expression",
        }
    }
}

/// Static capability flags of a slot type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotCapabilities {
    pub animatable: bool,
    pub expressions: bool,
}

impl SlotCapabilities {
    pub const PLAIN: Self = Self {
        animatable: false,
        expressions: false,
    };
    pub const FULL: Self = Self {
        animatable: true,
        expressions: true,
    };
}

#[derive(Debug, Clone)]
pub struct SlotChange {
    pub aspect: SlotAspect,
    pub old_value: Value,
    pub new_value: Value,
}

pub type SlotChangedHandler = Arc<dyn Fn(&SlotChange) + Send + Sync>;

/// An animatable property slot: a current value plus optional animation and expression.
pub trait AnimatableSlot: Send + Sync {
    fn id(&self) -> ObjectId;

    fn name(&self) -> &str;

    fn capabilities(&self) -> SlotCapabilities;

    fn current_value(&self) -> Value;

    /// `Value::Null` when no animation is set.
    fn animation(&self) -> Value;

    /// `Value::Null` when no expression is set.
    fn expression(&self) -> Value;

    fn subscribe(&self, aspect: SlotAspect, handler: SlotChangedHandler) -> Subscription;
}

pub type EasingChangedHandler = Arc<dyn Fn() + Send + Sync>;

/// A parametric easing curve whose named parameters can change in place.
pub trait ObservableEasing: Send + Sync {
    fn id(&self) -> ObjectId;

    fn parameters(&self) -> Vec<(Arc<str>, f64)>;

    fn subscribe_changed(&self, handler: EasingChangedHandler) -> Subscription;
}
