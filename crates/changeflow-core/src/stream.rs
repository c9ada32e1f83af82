//! Operation sink shared by every node of one observation tree.
//!
//! Nodes push; consumers subscribe either with an [`OperationObserver`] or a
//! crossbeam channel. Delivery is serialized: an operation emitted while
//! another is being delivered (from an observer callback or another thread)
//! is queued and delivered afterwards, so every subscriber sees operations in
//! sequence order.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{error, trace};

use crate::operation::{ChangeOperation, SequenceNumber};
use crate::sequence::SequenceGenerator;

/// Receives operations pushed to an [`OperationStream`].
pub trait OperationObserver: Send + Sync {
    fn on_next(&self, operation: &ChangeOperation);

    /// Terminal signal; no further `on_next` follows.
    fn on_completed(&self) {}
}

struct FnObserver<F>(F);

impl<F> OperationObserver for FnObserver<F>
where
    F: Fn(&ChangeOperation) + Send + Sync,
{
    fn on_next(&self, operation: &ChangeOperation) {
        (self.0)(operation)
    }
}

enum Pending {
    Next(ChangeOperation),
    Completed,
}

#[derive(Default)]
struct StreamState {
    observers: Vec<(u64, Arc<dyn OperationObserver>)>,
    channels: Vec<Sender<ChangeOperation>>,
    next_id: u64,
    queue: VecDeque<Pending>,
    draining: bool,
    completed: bool,
    /// Root trees currently attached; the last one to go completes the stream.
    roots: usize,
}

impl StreamState {
    fn close(&mut self) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.queue.push_back(Pending::Completed);
        true
    }
}

/// Push-only operation channel with a terminal "complete" signal.
#[derive(Clone, Default)]
pub struct OperationStream {
    state: Arc<Mutex<StreamState>>,
}

impl fmt::Debug for OperationStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state.lock();
        f.debug_struct("OperationStream")
            .field("observers", &st.observers.len())
            .field("channels", &st.channels.len())
            .field("roots", &st.roots)
            .field("completed", &st.completed)
            .finish()
    }
}

impl OperationStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn OperationObserver>) -> StreamSubscription {
        let mut st = self.state.lock();
        if st.completed {
            drop(st);
            observer.on_completed();
            return StreamSubscription {
                stream: Weak::new(),
                id: None,
            };
        }
        let id = st.next_id;
        st.next_id += 1;
        st.observers.push((id, observer));
        StreamSubscription {
            stream: Arc::downgrade(&self.state),
            id: Some(id),
        }
    }

    pub fn subscribe_fn<F>(&self, f: F) -> StreamSubscription
    where
        F: Fn(&ChangeOperation) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnObserver(f)))
    }

    /// The receiver disconnects once the stream completes and drains.
    pub fn subscribe_channel(&self) -> Receiver<ChangeOperation> {
        let (tx, rx) = unbounded();
        let mut st = self.state.lock();
        if !st.completed {
            st.channels.push(tx);
        }
        rx
    }

    /// Stamps and queues one operation, then delivers everything pending.
    ///
    /// Stamping happens under the stream lock so queue order and sequence
    /// order coincide. Returns `None` if the stream has already completed,
    /// which means a node outlived its disposal.
    pub fn emit<F>(&self, sequence: &SequenceGenerator, build: F) -> Option<SequenceNumber>
    where
        F: FnOnce(SequenceNumber) -> ChangeOperation,
    {
        let seq = {
            let mut st = self.state.lock();
            if st.completed {
                error!("operation emitted after the stream completed");
                debug_assert!(false, "operation emitted after the stream completed");
                return None;
            }
            let seq = sequence.next();
            st.queue.push_back(Pending::Next(build(seq)));
            seq
        };
        self.drain();
        Some(seq)
    }

    /// Idempotent. Subscribers receive `on_completed` after every pending operation.
    pub fn complete(&self) {
        let closed = self.state.lock().close();
        if closed {
            self.drain();
        }
    }

    /// Counts one more attached root tree. `false` once the stream has completed.
    pub(crate) fn register_root(&self) -> bool {
        let mut st = self.state.lock();
        if st.completed {
            return false;
        }
        st.roots += 1;
        true
    }

    /// Releases a disposed root; releasing the last live root completes the stream.
    pub(crate) fn release_root(&self) {
        let closed = {
            let mut st = self.state.lock();
            st.roots = st.roots.saturating_sub(1);
            st.roots == 0 && st.close()
        };
        if closed {
            self.drain();
        }
    }

    /// Undoes [`register_root`](Self::register_root) for a root that failed to attach.
    pub(crate) fn abandon_root(&self) {
        let mut st = self.state.lock();
        st.roots = st.roots.saturating_sub(1);
    }

    /// Root trees currently attached.
    pub fn root_count(&self) -> usize {
        self.state.lock().roots
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    pub fn observer_count(&self) -> usize {
        let st = self.state.lock();
        st.observers.len() + st.channels.len()
    }

    fn drain(&self) {
        {
            let mut st = self.state.lock();
            if st.draining {
                return;
            }
            st.draining = true;
        }
        let _guard = DrainGuard(&self.state);

        loop {
            let (item, observers) = {
                let mut st = self.state.lock();
                let Some(item) = st.queue.pop_front() else {
                    // Cleared under the same lock that saw the queue empty, so a
                    // concurrent emit either lands in this drain or starts its own.
                    st.draining = false;
                    return;
                };
                if let Pending::Next(op) = &item {
                    // Unbounded sends never block; drop receivers that went away.
                    st.channels.retain(|tx| tx.send(op.clone()).is_ok());
                }
                let observers: Vec<_> = st.observers.iter().map(|(_, o)| o.clone()).collect();
                (item, observers)
            };

            match item {
                Pending::Next(op) => {
                    trace!(
                        seq = op.sequence_number(),
                        path = op.property_path(),
                        kind = op.payload().name(),
                        "operation emitted"
                    );
                    for o in &observers {
                        o.on_next(&op);
                    }
                }
                Pending::Completed => {
                    {
                        let mut st = self.state.lock();
                        st.observers.clear();
                        st.channels.clear();
                    }
                    for o in &observers {
                        o.on_completed();
                    }
                }
            }
        }
    }
}

struct DrainGuard<'a>(&'a Mutex<StreamState>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        // Only reached with `draining` still set when an observer panicked.
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

/// Observer registration; removes the observer on drop.
#[must_use = "dropping a StreamSubscription unsubscribes immediately"]
pub struct StreamSubscription {
    stream: Weak<Mutex<StreamState>>,
    id: Option<u64>,
}

impl StreamSubscription {
    pub fn unsubscribe(&mut self) {
        if let Some(id) = self.id.take() {
            if let Some(state) = self.stream.upgrade() {
                state.lock().observers.retain(|(i, _)| *i != id);
            }
        }
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CoreObject;
    use crate::model::TypeRegistry;
    use crate::operation::{OperationPayload, UpdateKind};
    use crate::value::{ObjectRef, Value};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn target() -> ObjectRef {
        let registry = TypeRegistry::new();
        let def = registry.define("Target", &["Name"]);
        CoreObject::new(def)
    }

    fn push(stream: &OperationStream, seq: &SequenceGenerator, target: &ObjectRef) -> Option<u64> {
        stream.emit(seq, |n| {
            ChangeOperation::new(
                n,
                target.clone(),
                "Name",
                OperationPayload::update(UpdateKind::Property, Value::from(n as i64), Value::Null),
            )
        })
    }

    #[test]
    fn fan_out_to_every_subscriber() {
        let stream = OperationStream::new();
        let seq = SequenceGenerator::new();
        let t = target();
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let a = seen_a.clone();
        let b = seen_b.clone();
        let _sa = stream.subscribe_fn(move |op| a.lock().push(op.sequence_number()));
        let _sb = stream.subscribe_fn(move |op| b.lock().push(op.sequence_number()));
        let rx = stream.subscribe_channel();

        push(&stream, &seq, &t);
        push(&stream, &seq, &t);

        assert_eq!(*seen_a.lock(), vec![1, 2]);
        assert_eq!(*seen_b.lock(), vec![1, 2]);
        let got: Vec<_> = rx.try_iter().map(|op| op.sequence_number()).collect();
        assert_eq!(got, vec![1, 2]);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let stream = OperationStream::new();
        let seq = SequenceGenerator::new();
        let t = target();
        let seen = Arc::new(Mutex::new(0usize));
        let s = seen.clone();
        let sub = stream.subscribe_fn(move |_| *s.lock() += 1);
        push(&stream, &seq, &t);
        drop(sub);
        push(&stream, &seq, &t);
        assert_eq!(*seen.lock(), 1);
        assert_eq!(stream.observer_count(), 0);
    }

    struct Completion(AtomicBool);

    impl OperationObserver for Completion {
        fn on_next(&self, _operation: &ChangeOperation) {}
        fn on_completed(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn complete_signals_observers_and_disconnects_channels() {
        let stream = OperationStream::new();
        let seq = SequenceGenerator::new();
        let t = target();
        let done = Arc::new(Completion(AtomicBool::new(false)));
        let _sub = stream.subscribe(done.clone());
        let rx = stream.subscribe_channel();

        push(&stream, &seq, &t);
        stream.complete();
        stream.complete();

        assert!(done.0.load(Ordering::SeqCst));
        assert_eq!(rx.recv().unwrap().sequence_number(), 1);
        assert!(rx.recv().is_err());
        assert!(stream.is_completed());
    }

    #[test]
    fn last_released_root_completes() {
        let stream = OperationStream::new();
        let done = Arc::new(Completion(AtomicBool::new(false)));
        let _sub = stream.subscribe(done.clone());
        assert!(stream.register_root());
        assert!(stream.register_root());

        stream.release_root();
        assert!(!stream.is_completed());
        assert_eq!(stream.root_count(), 1);

        stream.release_root();
        assert!(stream.is_completed());
        assert!(done.0.load(Ordering::SeqCst));
        assert!(!stream.register_root());
    }

    #[test]
    fn abandoned_root_leaves_stream_open() {
        let stream = OperationStream::new();
        assert!(stream.register_root());
        stream.abandon_root();
        assert_eq!(stream.root_count(), 0);
        assert!(!stream.is_completed());
    }

    #[test]
    fn late_subscriber_is_completed_immediately() {
        let stream = OperationStream::new();
        stream.complete();
        let done = Arc::new(Completion(AtomicBool::new(false)));
        let _sub = stream.subscribe(done.clone());
        assert!(done.0.load(Ordering::SeqCst));
        assert!(stream.subscribe_channel().recv().is_err());
    }

    #[test]
    fn reentrant_emit_is_delivered_after_current_operation() {
        let stream = OperationStream::new();
        let seq = Arc::new(SequenceGenerator::new());
        let t = target();
        let order_a = Arc::new(Mutex::new(Vec::new()));
        let order_b = Arc::new(Mutex::new(Vec::new()));

        let (s2, seq2, t2, a) = (stream.clone(), seq.clone(), t.clone(), order_a.clone());
        let _sa = stream.subscribe_fn(move |op| {
            a.lock().push(op.sequence_number());
            if op.sequence_number() == 1 {
                push(&s2, &seq2, &t2);
            }
        });
        let b = order_b.clone();
        let _sb = stream.subscribe_fn(move |op| b.lock().push(op.sequence_number()));

        push(&stream, &seq, &t);

        assert_eq!(*order_a.lock(), vec![1, 2]);
        assert_eq!(*order_b.lock(), vec![1, 2]);
    }
}
