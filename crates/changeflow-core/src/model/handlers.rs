use std::sync::Arc;

use parking_lot::Mutex;

use crate::source::Subscription;

struct HandlerList<H> {
    next_id: u64,
    entries: Vec<(u64, H)>,
}

/// Registered notification handlers of one event source.
///
/// Handlers are snapshotted before invocation so a handler may subscribe or
/// unsubscribe (including itself) while being called.
pub(crate) struct HandlerSet<H> {
    inner: Arc<Mutex<HandlerList<H>>>,
}

impl<H> Default for HandlerSet<H> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HandlerList {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<H: Clone + Send + 'static> HandlerSet<H> {
    pub(crate) fn subscribe(&self, handler: H) -> Subscription {
        let id = {
            let mut list = self.inner.lock();
            let id = list.next_id;
            list.next_id += 1;
            list.entries.push((id, handler));
            id
        };
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().entries.retain(|(i, _)| *i != id);
            }
        })
    }

    pub(crate) fn snapshot(&self) -> Vec<H> {
        self.inner.lock().entries.iter().map(|(_, h)| h.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}
