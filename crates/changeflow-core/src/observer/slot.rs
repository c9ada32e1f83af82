use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::debug;

use super::{spawn_or_leaf, Lineage, ObservationContext, ObservationNode};
use crate::filter::join_path;
use crate::operation::{OperationPayload, UpdateKind};
use crate::source::{SlotAspect, SlotChange, Subscription};
use crate::stream::OperationStream;
use crate::value::{ObjectRef, SlotRef, Value};

/// Which child, if any, an aspect's value gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recurse {
    Never,
    AnyShape,
    ObjectOnly,
}

/// How one slot aspect is filtered, addressed and reported.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AspectLayout {
    pub aspect: SlotAspect,
    /// Segment the PathFilter must allow.
    pub filter_name: &'static str,
    /// Appended to the node path; `None` reports at the node path itself.
    pub suffix: Option<&'static str>,
    pub kind: UpdateKind,
    pub recurse: Recurse,
}

impl AspectLayout {
    fn path(&self, base: &str) -> String {
        match self.suffix {
            Some(suffix) => join_path(base, suffix),
            None => base.to_string(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SlotLayout {
    pub label: &'static str,
    pub value: AspectLayout,
    pub animation: AspectLayout,
    pub expression: Option<AspectLayout>,
}

impl SlotLayout {
    fn aspect(&self, aspect: SlotAspect) -> Option<&AspectLayout> {
        match aspect {
            SlotAspect::CurrentValue => Some(&self.value),
            SlotAspect::Animation => Some(&self.animation),
            SlotAspect::Expression => self.expression.as_ref(),
        }
    }
}

/// Shared machinery of [`AnimatablePropertyNode`](super::AnimatablePropertyNode)
/// and [`PropertyNode`](super::PropertyNode): one subscription and at most
/// one child per enabled aspect.
pub(crate) struct SlotNode {
    inner: Arc<SlotInner>,
}

struct SlotInner {
    slot: SlotRef,
    owner: ObjectRef,
    path: Arc<str>,
    ctx: ObservationContext,
    lineage: Lineage,
    layout: &'static SlotLayout,
    completes_stream: bool,
    state: ReentrantMutex<RefCell<SlotState>>,
}

#[derive(Default)]
struct SlotState {
    disposed: bool,
    subscriptions: Vec<Subscription>,
    children: HashMap<SlotAspect, ObservationNode>,
}

impl SlotNode {
    pub(crate) fn create(
        slot: SlotRef,
        owner: ObjectRef,
        path: &str,
        ctx: &ObservationContext,
        lineage: &Lineage,
        layout: &'static SlotLayout,
        completes_stream: bool,
    ) -> Self {
        let inner = Arc::new(SlotInner {
            slot,
            owner,
            path: Arc::from(path),
            ctx: ctx.clone(),
            lineage: lineage.clone(),
            layout,
            completes_stream,
            state: ReentrantMutex::new(RefCell::new(SlotState::default())),
        });
        inner.initialize();
        debug!(path, slot = inner.slot.name(), kind = layout.label, "slot node attached");
        Self { inner }
    }

    pub(crate) fn path(&self) -> &str {
        &self.inner.path
    }

    pub(crate) fn slot(&self) -> &SlotRef {
        &self.inner.slot
    }

    pub(crate) fn operations(&self) -> &OperationStream {
        self.inner.ctx.operations()
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.inner.state.lock().borrow().subscriptions.len()
    }

    pub(crate) fn has_child(&self, aspect: SlotAspect) -> bool {
        self.inner.state.lock().borrow().children.contains_key(&aspect)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.inner.state.lock().borrow().disposed
    }

    pub(crate) fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for SlotNode {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl SlotInner {
    fn enabled_aspects(&self) -> Vec<AspectLayout> {
        let caps = self.slot.capabilities();
        let tracked = self.ctx.tracked(&self.path);
        let mut aspects = vec![self.layout.value];
        if caps.animatable {
            aspects.push(self.layout.animation);
        }
        if caps.expressions {
            aspects.extend(self.layout.expression);
        }
        aspects.retain(|a| tracked.allows(a.filter_name));
        aspects
    }

    fn initialize(self: &Arc<Self>) {
        let guard = self.state.lock();

        for layout in self.enabled_aspects() {
            let weak = Arc::downgrade(self);
            let subscription = self.slot.subscribe(
                layout.aspect,
                Arc::new(move |change: &SlotChange| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_changed(change);
                    }
                }),
            );
            guard.borrow_mut().subscriptions.push(subscription);

            let value = match layout.aspect {
                SlotAspect::CurrentValue => self.slot.current_value(),
                SlotAspect::Animation => self.slot.animation(),
                SlotAspect::Expression => self.slot.expression(),
            };
            if let Some(child) = self.spawn_for(&layout, &value) {
                guard.borrow_mut().children.insert(layout.aspect, child);
            }
        }
    }

    fn spawn_for(&self, layout: &AspectLayout, value: &Value) -> Option<ObservationNode> {
        let recurse = match layout.recurse {
            Recurse::Never => false,
            Recurse::AnyShape => true,
            Recurse::ObjectOnly => matches!(value, Value::Object(_)),
        };
        if !recurse {
            return None;
        }
        let path = layout.path(&self.path);
        if layout.suffix.is_none() {
            // Reported at the slot path, filtered as `path.<filter_name>`.
            let ctx = self.ctx.lifted(&self.path, layout.filter_name);
            return spawn_or_leaf(value, &self.owner, &path, &ctx, &self.lineage);
        }
        spawn_or_leaf(value, &self.owner, &path, &self.ctx, &self.lineage)
    }

    fn on_changed(&self, change: &SlotChange) {
        let Some(layout) = self.layout.aspect(change.aspect) else {
            return;
        };

        let guard = self.state.lock();
        let previous = {
            let mut st = guard.borrow_mut();
            if st.disposed {
                return;
            }
            st.children.remove(&change.aspect)
        };
        if let Some(old) = previous {
            old.dispose();
        }
        if let Some(child) = self.spawn_for(layout, &change.new_value) {
            guard.borrow_mut().children.insert(change.aspect, child);
        }

        let path = layout.path(&self.path);
        self.ctx.publish(
            &self.owner,
            &path,
            OperationPayload::update(
                layout.kind,
                change.new_value.clone(),
                change.old_value.clone(),
            ),
        );
    }

    fn dispose(&self) {
        let guard = self.state.lock();
        let (subscriptions, children) = {
            let mut st = guard.borrow_mut();
            if st.disposed {
                return;
            }
            st.disposed = true;
            (
                std::mem::take(&mut st.subscriptions),
                std::mem::take(&mut st.children),
            )
        };

        drop(subscriptions);
        for child in children.into_values() {
            child.dispose();
        }
        drop(guard);

        debug!(path = %self.path, kind = self.layout.label, "slot node disposed");
        if self.completes_stream {
            self.ctx.operations().release_root();
        }
    }
}
