use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::debug;

use super::ObservationContext;
use crate::filter::{join_path, TrackedSegments};
use crate::operation::{OperationPayload, UpdateKind};
use crate::source::Subscription;
use crate::stream::OperationStream;
use crate::value::{EasingRef, ObjectRef, Value};
use crate::Result;

/// Observes the named parameters of an easing curve.
///
/// Keeps a snapshot of the parameters and, on each change notification,
/// reports every parameter whose value differs at `path.<parameter>`.
/// Dropping the node disposes it.
pub struct EasingNode {
    inner: Arc<EasingInner>,
}

struct EasingInner {
    easing: EasingRef,
    owner: ObjectRef,
    path: Arc<str>,
    ctx: ObservationContext,
    tracked: TrackedSegments,
    completes_stream: bool,
    state: ReentrantMutex<RefCell<EasingState>>,
}

#[derive(Default)]
struct EasingState {
    disposed: bool,
    subscription: Option<Subscription>,
    snapshot: Vec<(Arc<str>, f64)>,
}

impl EasingNode {
    /// Attaches a root node; operations target `owner`.
    pub fn attach(
        easing: EasingRef,
        owner: ObjectRef,
        path: &str,
        ctx: &ObservationContext,
    ) -> Result<Self> {
        ctx.open_root()?;
        Ok(Self::create(easing, owner, path, ctx, true))
    }

    pub(crate) fn spawn(
        easing: EasingRef,
        owner: ObjectRef,
        path: &str,
        ctx: &ObservationContext,
    ) -> Self {
        Self::create(easing, owner, path, ctx, false)
    }

    fn create(
        easing: EasingRef,
        owner: ObjectRef,
        path: &str,
        ctx: &ObservationContext,
        completes_stream: bool,
    ) -> Self {
        let inner = Arc::new(EasingInner {
            easing,
            owner,
            path: Arc::from(path),
            ctx: ctx.clone(),
            tracked: ctx.tracked(path),
            completes_stream,
            state: ReentrantMutex::new(RefCell::new(EasingState::default())),
        });
        inner.initialize();
        debug!(path, "easing node attached");
        Self { inner }
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn operations(&self) -> &OperationStream {
        self.inner.ctx.operations()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().borrow().disposed
    }

    /// Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for EasingNode {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl EasingInner {
    fn initialize(self: &Arc<Self>) {
        let guard = self.state.lock();
        if self.tracked.tracks_nothing() {
            return;
        }
        let weak = Arc::downgrade(self);
        let subscription = self.easing.subscribe_changed(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_changed();
            }
        }));
        let mut st = guard.borrow_mut();
        st.subscription = Some(subscription);
        st.snapshot = self.easing.parameters();
    }

    fn on_changed(&self) {
        let guard = self.state.lock();
        let changed: Vec<(Arc<str>, f64, Option<f64>)> = {
            let mut st = guard.borrow_mut();
            if st.disposed {
                return;
            }
            let current = self.easing.parameters();
            let changed = current
                .iter()
                .filter_map(|(name, value)| {
                    let old = st
                        .snapshot
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, v)| *v);
                    (old != Some(*value)).then(|| (name.clone(), *value, old))
                })
                .collect();
            // Updated even while suppressed so replayed changes are not reported later.
            st.snapshot = current;
            changed
        };

        for (name, new_value, old_value) in changed {
            if !self.tracked.allows(&name) {
                continue;
            }
            self.ctx.publish(
                &self.owner,
                &join_path(&self.path, &name),
                OperationPayload::update(
                    UpdateKind::EasingParameter,
                    Value::Float(new_value),
                    old_value.map(Value::Float).unwrap_or_default(),
                ),
            );
        }
    }

    fn dispose(&self) {
        let guard = self.state.lock();
        let subscription = {
            let mut st = guard.borrow_mut();
            if st.disposed {
                return;
            }
            st.disposed = true;
            st.subscription.take()
        };
        drop(subscription);
        drop(guard);

        debug!(path = %self.path, "easing node disposed");
        if self.completes_stream {
            self.ctx.operations().release_root();
        }
    }
}
