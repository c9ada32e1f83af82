use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, warn};

use super::{CollectionDiff, Lineage, ObjectNode, ObservationContext};
use crate::source::{CollectionChange, Subscription};
use crate::stream::OperationStream;
use crate::value::{ListRef, ObjectId, ObjectRef, Value};
use crate::Result;

/// Observes one list: a child [`ObjectNode`] per distinct composite element,
/// keyed by element identity and sharing the list's path.
///
/// Dropping the node disposes it.
pub struct ListNode {
    inner: Arc<ListInner>,
}

struct ListInner {
    list: ListRef,
    owner: ObjectRef,
    path: Arc<str>,
    ctx: ObservationContext,
    lineage: Lineage,
    completes_stream: bool,
    state: ReentrantMutex<RefCell<ListState>>,
}

struct ElementChild {
    node: ObjectNode,
    occurrences: usize,
}

#[derive(Default)]
struct ListState {
    disposed: bool,
    subscription: Option<Subscription>,
    children: HashMap<ObjectId, ElementChild>,
}

impl ListState {
    /// Drops one occurrence of `item`; returns the child once the last one goes.
    fn release(&mut self, item: &Value) -> Option<ObjectNode> {
        let id = item.as_object()?.id();
        let child = self.children.get_mut(&id)?;
        child.occurrences -= 1;
        if child.occurrences == 0 {
            self.children.remove(&id).map(|c| c.node)
        } else {
            None
        }
    }
}

impl ListNode {
    /// Attaches a root list node; operations target `owner`.
    pub fn attach(
        list: ListRef,
        owner: ObjectRef,
        path: &str,
        ctx: &ObservationContext,
    ) -> Result<Self> {
        ctx.open_root()?;
        Ok(Self::create(list, owner, path, ctx, &Lineage::default(), true))
    }

    pub(crate) fn spawn(
        list: ListRef,
        owner: ObjectRef,
        path: &str,
        ctx: &ObservationContext,
        lineage: &Lineage,
    ) -> Self {
        Self::create(list, owner, path, ctx, lineage, false)
    }

    fn create(
        list: ListRef,
        owner: ObjectRef,
        path: &str,
        ctx: &ObservationContext,
        lineage: &Lineage,
        completes_stream: bool,
    ) -> Self {
        let inner = Arc::new(ListInner {
            list,
            owner,
            path: Arc::from(path),
            ctx: ctx.clone(),
            lineage: lineage.clone(),
            completes_stream,
            state: ReentrantMutex::new(RefCell::new(ListState::default())),
        });
        inner.initialize();
        debug!(path, "list node attached");
        Self { inner }
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn list(&self) -> &ListRef {
        &self.inner.list
    }

    pub fn operations(&self) -> &OperationStream {
        self.inner.ctx.operations()
    }

    /// Number of distinct composite elements currently observed.
    pub fn child_count(&self) -> usize {
        self.inner.state.lock().borrow().children.len()
    }

    pub fn observes_element(&self, id: ObjectId) -> bool {
        self.inner.state.lock().borrow().children.contains_key(&id)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().borrow().disposed
    }

    /// Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for ListNode {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl ListInner {
    fn initialize(self: &Arc<Self>) {
        let guard = self.state.lock();

        let weak = Arc::downgrade(self);
        let subscription =
            self.list
                .subscribe_collection_changed(Arc::new(move |change: &CollectionChange| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_collection_changed(change);
                    }
                }));
        guard.borrow_mut().subscription = Some(subscription);

        for item in self.list.items() {
            self.retain(&guard, &item);
        }
    }

    /// Adds one occurrence of `item`, spawning its child on the first.
    fn retain(&self, state: &RefCell<ListState>, item: &Value) {
        let Some(object) = item.as_object() else {
            return;
        };
        let id = object.id();
        if let Some(child) = state.borrow_mut().children.get_mut(&id) {
            child.occurrences += 1;
            return;
        }
        match ObjectNode::spawn(object.clone(), &self.path, &self.ctx, &self.lineage) {
            Ok(node) => {
                state.borrow_mut().children.insert(
                    id,
                    ElementChild {
                        node,
                        occurrences: 1,
                    },
                );
            }
            Err(e) => {
                warn!(path = %self.path, element = %id, error = %e, "list element not observed");
            }
        }
    }

    fn on_collection_changed(&self, change: &CollectionChange) {
        let Some(diff) = CollectionDiff::translate(change) else {
            debug!(path = %self.path, "collection reset ignored");
            return;
        };

        let guard = self.state.lock();
        let detached: Vec<ObjectNode> = {
            let mut st = guard.borrow_mut();
            if st.disposed {
                return;
            }
            diff.detach.iter().filter_map(|item| st.release(item)).collect()
        };
        for node in detached {
            node.dispose();
        }
        for item in &diff.attach {
            self.retain(&guard, item);
        }

        for payload in diff.operations {
            self.ctx.publish(&self.owner, &self.path, payload);
        }
    }

    fn dispose(&self) {
        let guard = self.state.lock();
        let (subscription, children) = {
            let mut st = guard.borrow_mut();
            if st.disposed {
                return;
            }
            st.disposed = true;
            (st.subscription.take(), std::mem::take(&mut st.children))
        };

        drop(subscription);
        for child in children.into_values() {
            child.node.dispose();
        }
        drop(guard);

        debug!(path = %self.path, "list node disposed");
        if self.completes_stream {
            self.ctx.operations().release_root();
        }
    }
}
