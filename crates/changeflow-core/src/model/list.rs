use std::fmt;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use uuid::Uuid;

use super::handlers::HandlerSet;
use crate::source::{CollectionChange, CollectionChangedHandler, ObservableList, Subscription};
use crate::value::{ObjectId, Value};

/// Reactive list raising one collection-change notification per mutation.
///
/// Index arguments follow `Vec` semantics and panic when out of bounds.
/// Mutations from several threads are applied and reported one at a time.
pub struct CoreList {
    id: ObjectId,
    items: RwLock<Vec<Value>>,
    handlers: HandlerSet<CollectionChangedHandler>,
    raising: ReentrantMutex<()>,
}

impl CoreList {
    pub fn new() -> Arc<Self> {
        Self::from_items(Vec::new())
    }

    pub fn from_items(items: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            items: RwLock::new(items),
            handlers: HandlerSet::default(),
            raising: ReentrantMutex::new(()),
        })
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    pub fn push(&self, item: impl Into<Value>) {
        let _raising = self.raising.lock();
        let index = self.len();
        self.insert(index, item);
    }

    pub fn insert(&self, index: usize, item: impl Into<Value>) {
        self.insert_range(index, vec![item.into()]);
    }

    pub fn insert_range(&self, index: usize, items: Vec<Value>) {
        if items.is_empty() {
            return;
        }
        let _raising = self.raising.lock();
        {
            let mut list = self.items.write();
            list.splice(index..index, items.iter().cloned());
        }
        self.raise(CollectionChange::Add { index, items });
    }

    pub fn remove_at(&self, index: usize) -> Value {
        self.remove_range(index, 1)
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    pub fn remove_range(&self, index: usize, count: usize) -> Vec<Value> {
        if count == 0 {
            return Vec::new();
        }
        let _raising = self.raising.lock();
        let items: Vec<Value> = self.items.write().drain(index..index + count).collect();
        self.raise(CollectionChange::Remove {
            index,
            items: items.clone(),
        });
        items
    }

    pub fn move_item(&self, old_index: usize, new_index: usize) {
        self.move_range(old_index, 1, new_index);
    }

    /// Moves `count` items starting at `old_index` so the first lands at `new_index`.
    pub fn move_range(&self, old_index: usize, count: usize, new_index: usize) {
        if count == 0 || old_index == new_index {
            return;
        }
        let _raising = self.raising.lock();
        {
            let mut list = self.items.write();
            let moved: Vec<Value> = list.drain(old_index..old_index + count).collect();
            list.splice(new_index..new_index, moved);
        }
        self.raise(CollectionChange::Move {
            old_index,
            new_index,
            count,
        });
    }

    /// Swaps the element at `index` for `item`.
    pub fn replace(&self, index: usize, item: impl Into<Value>) {
        let _raising = self.raising.lock();
        let new_item = item.into();
        let old_item = std::mem::replace(&mut self.items.write()[index], new_item.clone());
        self.raise(CollectionChange::Replace {
            index,
            old_items: vec![old_item],
            new_items: vec![new_item],
        });
    }

    /// Removes every element, reported as a single ranged removal.
    pub fn clear(&self) {
        let _raising = self.raising.lock();
        let count = self.len();
        self.remove_range(0, count);
    }

    /// Replaces the whole content without itemized notification.
    pub fn reset(&self, items: Vec<Value>) {
        let _raising = self.raising.lock();
        *self.items.write() = items;
        self.raise(CollectionChange::Reset);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn raise(&self, change: CollectionChange) {
        for handler in self.handlers.snapshot() {
            handler(&change);
        }
    }
}

impl ObservableList for CoreList {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn items(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    fn subscribe_collection_changed(&self, handler: CollectionChangedHandler) -> Subscription {
        self.handlers.subscribe(handler)
    }
}

impl fmt::Debug for CoreList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreList")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}
