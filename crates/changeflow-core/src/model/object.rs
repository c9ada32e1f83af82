use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use uuid::Uuid;

use super::handlers::HandlerSet;
use super::registry::{TypeDefinition, PARENT_PROPERTY};
use crate::source::{
    ObservableObject, PropertyChange, PropertyChangedHandler, PropertyDescriptor, PropertyId,
    Subscription,
};
use crate::value::{ObjectId, ObjectRef, SlotRef, Value};
use crate::{ObserveError, Result};

/// Reactive composite object with the properties of one [`TypeDefinition`].
pub struct CoreObject {
    id: ObjectId,
    definition: Arc<TypeDefinition>,
    values: RwLock<HashMap<PropertyId, Value>>,
    parent: Mutex<Option<Weak<dyn ObservableObject>>>,
    node_item: Option<SlotRef>,
    handlers: HandlerSet<PropertyChangedHandler>,
    /// Held from write through notification so handlers see writes in order.
    raising: ReentrantMutex<()>,
}

impl CoreObject {
    pub fn new(definition: Arc<TypeDefinition>) -> Arc<Self> {
        Self::build(definition, None)
    }

    /// An object exposing `slot` as its node item.
    pub fn with_node_item(definition: Arc<TypeDefinition>, slot: SlotRef) -> Arc<Self> {
        Self::build(definition, Some(slot))
    }

    fn build(definition: Arc<TypeDefinition>, node_item: Option<SlotRef>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            definition,
            values: RwLock::new(HashMap::new()),
            parent: Mutex::new(None),
            node_item,
            handlers: HandlerSet::default(),
            raising: ReentrantMutex::new(()),
        })
    }

    pub fn definition(&self) -> &Arc<TypeDefinition> {
        &self.definition
    }

    /// Current value of `name`; `Null` when unset or undeclared.
    pub fn get(&self, name: &str) -> Value {
        match self.definition.property(name) {
            Some(p) if p.id == PARENT_PROPERTY => self.parent_value(),
            Some(p) => self.values.read().get(&p.id).cloned().unwrap_or_default(),
            None => Value::Null,
        }
    }

    /// Assigns `name` and raises a change notification if the value differs.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let property = self
            .definition
            .property(name)
            .filter(|p| p.id != PARENT_PROPERTY)
            .cloned()
            .ok_or_else(|| ObserveError::PropertyRead {
                property: name.to_string(),
                reason: format!("not declared on {}", self.definition.name()),
            })?;

        let new_value = value.into();
        let _raising = self.raising.lock();
        let old_value = {
            let mut values = self.values.write();
            let old = values.insert(property.id, new_value.clone()).unwrap_or_default();
            if old == new_value {
                return Ok(());
            }
            old
        };
        self.raise(PropertyChange {
            property,
            old_value,
            new_value,
        });
        Ok(())
    }

    /// Updates the parent back-reference and raises a change on it.
    pub fn set_parent(&self, parent: Option<&ObjectRef>) {
        let new_value = parent.cloned().map(Value::Object).unwrap_or_default();
        let _raising = self.raising.lock();
        let old_value = {
            let mut slot = self.parent.lock();
            let old = slot
                .as_ref()
                .and_then(Weak::upgrade)
                .map(Value::Object)
                .unwrap_or_default();
            *slot = parent.map(Arc::downgrade);
            old
        };
        if old_value == new_value {
            return;
        }
        if let Some(property) = self.definition.property_by_id(PARENT_PROPERTY).cloned() {
            self.raise(PropertyChange {
                property,
                old_value,
                new_value,
            });
        }
    }

    /// Number of live change subscriptions.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn parent_value(&self) -> Value {
        self.parent
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Value::Object)
            .unwrap_or_default()
    }

    fn raise(&self, change: PropertyChange) {
        for handler in self.handlers.snapshot() {
            handler(&change);
        }
    }
}

impl ObservableObject for CoreObject {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn type_name(&self) -> &str {
        self.definition.name()
    }

    fn get_value(&self, property: &PropertyDescriptor) -> Result<Value> {
        match self.definition.property_by_id(property.id) {
            Some(p) if p.id == PARENT_PROPERTY => Ok(self.parent_value()),
            Some(p) => Ok(self.values.read().get(&p.id).cloned().unwrap_or_default()),
            None => Err(ObserveError::PropertyRead {
                property: property.name.to_string(),
                reason: format!("not declared on {}", self.definition.name()),
            }),
        }
    }

    fn subscribe_property_changed(&self, handler: PropertyChangedHandler) -> Subscription {
        self.handlers.subscribe(handler)
    }

    fn node_item(&self) -> Option<SlotRef> {
        self.node_item.clone()
    }
}

impl fmt::Debug for CoreObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreObject")
            .field("id", &self.id)
            .field("type", &self.definition.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn set_raises_only_on_change() {
        let registry = TypeRegistry::new();
        let obj = CoreObject::new(registry.define("Item", &["Name"]));
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let _sub = obj.subscribe_property_changed(Arc::new(move |change| {
            assert_eq!(&*change.property.name, "Name");
            c.fetch_add(1, Ordering::SeqCst);
        }));

        obj.set("Name", "a").unwrap();
        obj.set("Name", "a").unwrap();
        obj.set("Name", "b").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(obj.get("Name"), Value::from("b"));
    }

    #[test]
    fn undeclared_property_is_rejected() {
        let registry = TypeRegistry::new();
        let obj = CoreObject::new(registry.define("Item", &["Name"]));
        assert!(obj.set("Missing", 1).is_err());
        assert!(obj.set("Parent", 1).is_err());
    }

    #[test]
    fn parent_is_a_weak_back_reference() {
        let registry = TypeRegistry::new();
        let def = registry.define("Node", &["Child"]);
        let parent: ObjectRef = CoreObject::new(def.clone());
        let child = CoreObject::new(def);
        child.set_parent(Some(&parent));
        assert_eq!(child.get("Parent"), Value::Object(parent.clone()));
        drop(parent);
        assert!(child.get("Parent").is_null());
    }
}
