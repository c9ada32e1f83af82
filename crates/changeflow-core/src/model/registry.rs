use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::source::{PropertyDescriptor, PropertyId, PropertyRegistry};
use crate::{ObserveError, Result};

/// Id of the hierarchical-parent back-reference shared by every type.
pub const PARENT_PROPERTY: PropertyId = 0;
pub const PARENT_PROPERTY_NAME: &str = "Parent";

static NEXT_PROPERTY_ID: AtomicU32 = AtomicU32::new(PARENT_PROPERTY + 1);

/// Declared properties of one composite type.
#[derive(Debug)]
pub struct TypeDefinition {
    name: String,
    properties: Vec<PropertyDescriptor>,
}

impl TypeDefinition {
    /// Builds a definition with fresh property ids. The parent back-reference
    /// is always declared first.
    pub fn new(name: impl Into<String>, tracked: &[&str], untracked: &[&str]) -> Arc<Self> {
        let mut properties = Vec::with_capacity(1 + tracked.len() + untracked.len());
        properties.push(PropertyDescriptor::new(PARENT_PROPERTY, PARENT_PROPERTY_NAME));
        for p in tracked {
            properties.push(PropertyDescriptor::new(fresh_id(), *p));
        }
        for p in untracked {
            properties.push(PropertyDescriptor::new(fresh_id(), *p).untracked());
        }
        Arc::new(Self {
            name: name.into(),
            properties,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| &*p.name == name)
    }

    pub fn property_by_id(&self, id: PropertyId) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.id == id)
    }
}

fn fresh_id() -> PropertyId {
    NEXT_PROPERTY_ID.fetch_add(1, Ordering::Relaxed)
}

/// In-memory [`PropertyRegistry`] keyed by type name.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<HashMap<String, Arc<TypeDefinition>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&self, name: &str, properties: &[&str]) -> Arc<TypeDefinition> {
        self.define_with_untracked(name, properties, &[])
    }

    /// Replaces any previous definition with the same name.
    pub fn define_with_untracked(
        &self,
        name: &str,
        tracked: &[&str],
        untracked: &[&str],
    ) -> Arc<TypeDefinition> {
        let def = TypeDefinition::new(name, tracked, untracked);
        self.register(def.clone());
        def
    }

    pub fn register(&self, definition: Arc<TypeDefinition>) {
        self.types
            .write()
            .insert(definition.name().to_string(), definition);
    }

    pub fn get(&self, name: &str) -> Option<Arc<TypeDefinition>> {
        self.types.read().get(name).cloned()
    }
}

impl PropertyRegistry for TypeRegistry {
    fn declared_properties(&self, type_name: &str) -> Result<Vec<PropertyDescriptor>> {
        self.types
            .read()
            .get(type_name)
            .map(|def| def.properties.clone())
            .ok_or_else(|| ObserveError::UnknownType(type_name.to_string()))
    }

    fn parent_property(&self) -> PropertyId {
        PARENT_PROPERTY
    }
}
