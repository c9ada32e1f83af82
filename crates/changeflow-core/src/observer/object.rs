use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, warn};

use super::{spawn_or_leaf, Lineage, ObservationContext, ObservationNode, PropertyNode};
use crate::filter::{join_path, TrackedSegments};
use crate::operation::{OperationPayload, UpdateKind};
use crate::source::{PropertyChange, PropertyDescriptor, PropertyId, Subscription};
use crate::stream::OperationStream;
use crate::value::ObjectRef;
use crate::{ObserveError, Result};

/// Observes one composite object: one child per tracked property whose
/// value is itself observable, plus the object's node item if it has one.
///
/// Dropping the node disposes it.
pub struct ObjectNode {
    inner: Arc<ObjectInner>,
}

struct ObjectInner {
    object: ObjectRef,
    path: Arc<str>,
    ctx: ObservationContext,
    /// Ancestors including this object.
    lineage: Lineage,
    tracked: TrackedSegments,
    completes_stream: bool,
    state: ReentrantMutex<RefCell<ObjectState>>,
}

#[derive(Default)]
struct ObjectState {
    disposed: bool,
    subscription: Option<Subscription>,
    children: HashMap<PropertyId, ObservationNode>,
    node_item: Option<ObservationNode>,
}

impl ObjectNode {
    /// Attaches a root node at `path`. Disposing the context's last live root
    /// completes its stream.
    pub fn attach(object: ObjectRef, path: &str, ctx: &ObservationContext) -> Result<Self> {
        ctx.open_root()?;
        Self::create(object, path, ctx, &Lineage::default(), true).inspect_err(|_| {
            ctx.operations().abandon_root();
        })
    }

    pub(crate) fn spawn(
        object: ObjectRef,
        path: &str,
        ctx: &ObservationContext,
        lineage: &Lineage,
    ) -> Result<Self> {
        Self::create(object, path, ctx, lineage, false)
    }

    fn create(
        object: ObjectRef,
        path: &str,
        ctx: &ObservationContext,
        lineage: &Lineage,
        completes_stream: bool,
    ) -> Result<Self> {
        let id = object.id();
        if ctx.detects_cycles() && lineage.contains(id) {
            return Err(ObserveError::Cycle(path.to_string()));
        }
        let properties = ctx.registry().declared_properties(object.type_name())?;

        let inner = Arc::new(ObjectInner {
            object,
            path: Arc::from(path),
            ctx: ctx.clone(),
            lineage: lineage.with(id),
            tracked: ctx.tracked(path),
            completes_stream,
            state: ReentrantMutex::new(RefCell::new(ObjectState::default())),
        });
        inner.initialize(&properties);
        debug!(path, type_name = inner.object.type_name(), "object node attached");
        Ok(Self { inner })
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn object(&self) -> &ObjectRef {
        &self.inner.object
    }

    pub fn operations(&self) -> &OperationStream {
        self.inner.ctx.operations()
    }

    /// Number of property children, not counting the node item.
    pub fn child_count(&self) -> usize {
        self.inner.state.lock().borrow().children.len()
    }

    pub fn has_node_item(&self) -> bool {
        self.inner.state.lock().borrow().node_item.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().borrow().disposed
    }

    /// Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for ObjectNode {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl ObjectInner {
    fn initialize(self: &Arc<Self>, properties: &[PropertyDescriptor]) {
        let guard = self.state.lock();

        let weak = Arc::downgrade(self);
        let subscription = self
            .object
            .subscribe_property_changed(Arc::new(move |change: &PropertyChange| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_property_changed(change);
                }
            }));

        let mut children = HashMap::new();
        for property in properties {
            if !self.observes(property) {
                continue;
            }
            let value = match self.object.get_value(property) {
                Ok(v) => v,
                Err(e) => {
                    warn!(path = %self.path, property = %property.name, error = %e, "property read failed; treating as leaf");
                    continue;
                }
            };
            let path = join_path(&self.path, &property.name);
            if let Some(child) = spawn_or_leaf(&value, &self.object, &path, &self.ctx, &self.lineage) {
                children.insert(property.id, child);
            }
        }

        let node_item = self.object.node_item().map(|slot| {
            ObservationNode::Property(PropertyNode::spawn(
                slot,
                self.object.clone(),
                &self.path,
                &self.ctx,
                &self.lineage,
            ))
        });

        let mut st = guard.borrow_mut();
        st.subscription = Some(subscription);
        st.children = children;
        st.node_item = node_item;
    }

    fn observes(&self, property: &PropertyDescriptor) -> bool {
        property.id != self.ctx.registry().parent_property()
            && property.tracked
            && self.tracked.allows(&property.name)
    }

    fn on_property_changed(&self, change: &PropertyChange) {
        if !self.observes(&change.property) {
            return;
        }

        let guard = self.state.lock();
        let previous = {
            let mut st = guard.borrow_mut();
            if st.disposed {
                return;
            }
            st.children.remove(&change.property.id)
        };
        if let Some(old) = previous {
            old.dispose();
        }

        let path = join_path(&self.path, &change.property.name);
        if let Some(child) =
            spawn_or_leaf(&change.new_value, &self.object, &path, &self.ctx, &self.lineage)
        {
            debug!(path = %path, kind = child.kind(), "child rebuilt");
            guard.borrow_mut().children.insert(change.property.id, child);
        }

        self.ctx.publish(
            &self.object,
            &path,
            OperationPayload::update(
                UpdateKind::Property,
                change.new_value.clone(),
                change.old_value.clone(),
            ),
        );
    }

    fn dispose(&self) {
        let guard = self.state.lock();
        let (subscription, children, node_item) = {
            let mut st = guard.borrow_mut();
            if st.disposed {
                return;
            }
            st.disposed = true;
            (
                st.subscription.take(),
                std::mem::take(&mut st.children),
                st.node_item.take(),
            )
        };

        drop(subscription);
        for child in children.into_values() {
            child.dispose();
        }
        if let Some(item) = node_item {
            item.dispose();
        }
        drop(guard);

        debug!(path = %self.path, "object node disposed");
        if self.completes_stream {
            self.ctx.operations().release_root();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoreList, CoreObject, TypeDefinition, TypeRegistry};
    use crate::operation::ChangeOperation;
    use crate::source::ObservableObject;
    use crate::value::Value;
    use crossbeam_channel::Receiver;

    fn setup() -> (Arc<TypeRegistry>, ObservationContext) {
        let registry = Arc::new(TypeRegistry::new());
        let ctx = ObservationContext::new(registry.clone());
        (registry, ctx)
    }

    fn drain(rx: &Receiver<ChangeOperation>) -> Vec<ChangeOperation> {
        rx.try_iter().collect()
    }

    #[test]
    fn leaf_change_emits_update_at_property_path() {
        let (registry, ctx) = setup();
        let obj = CoreObject::new(registry.define("Clip", &["Name", "Start"]));
        let node = ctx.observe(obj.clone()).unwrap();
        let rx = node.operations().subscribe_channel();

        obj.set("Start", 10).unwrap();

        let ops = drain(&rx);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].property_path(), "Start");
        assert_eq!(ops[0].update_kind(), Some(UpdateKind::Property));
        assert_eq!(ops[0].values(), Some((&Value::from(10), &Value::Null)));
        assert_eq!(node.child_count(), 0);
    }

    #[test]
    fn nested_composite_gets_child_at_dotted_path() {
        let (registry, ctx) = setup();
        let inner_def = registry.define("Transform", &["X"]);
        let outer = CoreObject::new(registry.define("Layer", &["Transform"]));
        let transform = CoreObject::new(inner_def);
        outer.set("Transform", Value::object(transform.clone())).unwrap();

        let node = ctx.observe(outer.clone()).unwrap();
        let rx = node.operations().subscribe_channel();
        assert_eq!(node.child_count(), 1);

        transform.set("X", 1.5).unwrap();
        let ops = drain(&rx);
        assert_eq!(ops[0].property_path(), "Transform.X");
        assert_eq!(ops[0].target().id(), transform.id());
    }

    #[test]
    fn parent_and_untracked_properties_are_ignored() {
        let (registry, ctx) = setup();
        let def = registry.define_with_untracked("Node", &["Child"], &["Cache"]);
        let parent: ObjectRef = CoreObject::new(def.clone());
        let obj = CoreObject::new(def);
        let node = ctx.observe(obj.clone()).unwrap();
        let rx = node.operations().subscribe_channel();

        obj.set_parent(Some(&parent));
        obj.set("Cache", 42).unwrap();

        assert!(drain(&rx).is_empty());
        assert_eq!(obj.handler_count(), 1);
    }

    #[test]
    fn unknown_child_type_becomes_leaf() {
        let (registry, ctx) = setup();
        let root = CoreObject::new(registry.define("Root", &["Child", "Name"]));
        let stray = CoreObject::new(TypeDefinition::new("Unregistered", &["A"], &[]));
        root.set("Child", Value::object(stray.clone())).unwrap();

        let node = ctx.observe(root.clone()).unwrap();
        let rx = node.operations().subscribe_channel();
        assert_eq!(node.child_count(), 0);
        assert_eq!(stray.handler_count(), 0);

        root.set("Name", "still observed").unwrap();
        root.set("Child", Value::Null).unwrap();
        let ops = drain(&rx);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].property_path(), "Child");
    }

    #[test]
    fn root_with_unknown_type_fails_to_attach() {
        let (_registry, ctx) = setup();
        let stray = CoreObject::new(TypeDefinition::new("Unregistered", &[], &[]));
        assert!(matches!(ctx.observe(stray), Err(ObserveError::UnknownType(_))));
        assert_eq!(ctx.operations().root_count(), 0);
        assert!(!ctx.operations().is_completed());
    }

    #[test]
    fn disposing_one_root_keeps_sibling_root_emitting() {
        let (registry, ctx) = setup();
        let def = registry.define("Clip", &["Name"]);
        let a = CoreObject::new(def.clone());
        let b = CoreObject::new(def);
        let root_a = ctx.observe(a).unwrap();
        let root_b = ctx.observe(b.clone()).unwrap();
        let rx = ctx.operations().subscribe_channel();

        drop(root_a);
        assert!(!root_b.is_disposed());
        assert!(!ctx.operations().is_completed());

        b.set("Name", "x").unwrap();
        assert_eq!(drain(&rx).len(), 1);

        root_b.dispose();
        assert!(ctx.operations().is_completed());
    }

    #[test]
    fn list_property_spawns_list_child() {
        let (registry, ctx) = setup();
        let root = CoreObject::new(registry.define("Scene", &["Layers"]));
        let layers = CoreList::new();
        root.set("Layers", Value::list(layers.clone())).unwrap();
        let node = ctx.observe(root).unwrap();
        assert_eq!(node.child_count(), 1);
        assert_eq!(layers.handler_count(), 1);
        node.dispose();
        assert_eq!(layers.handler_count(), 0);
    }

    #[test]
    fn dispose_is_idempotent_and_completes_stream() {
        let (registry, ctx) = setup();
        let obj = CoreObject::new(registry.define("Clip", &["Name"]));
        let node = ctx.observe(obj.clone()).unwrap();
        node.dispose();
        node.dispose();
        assert!(node.is_disposed());
        assert!(ctx.operations().is_completed());
        assert_eq!(obj.handler_count(), 0);
        assert!(matches!(ctx.observe(obj), Err(ObserveError::Disposed)));
    }

    #[test]
    fn cycle_through_user_property_is_broken() {
        let (registry, ctx) = setup();
        let def = registry.define("Link", &["Next"]);
        let a = CoreObject::new(def.clone());
        let b = CoreObject::new(def);
        a.set("Next", Value::object(b.clone())).unwrap();
        b.set("Next", Value::object(a.clone())).unwrap();

        let node = ctx.observe(a.clone()).unwrap();
        assert_eq!(node.child_count(), 1);
        assert_eq!(a.handler_count(), 1);
        assert_eq!(b.handler_count(), 1);

        // Break the reference cycle between the two test objects.
        node.dispose();
        b.set("Next", Value::Null).unwrap();
    }
}
