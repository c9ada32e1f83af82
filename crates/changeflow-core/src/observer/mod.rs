//! The recursive observation tree.
//!
//! A root [`ObjectNode`] enumerates its object's declared properties and
//! spawns one child per composite, list, animatable slot or easing value it
//! finds. Every node pushes onto the single [`OperationStream`] of its
//! [`ObservationContext`], stamping from the shared [`SequenceGenerator`].
//!
//! Node state lives behind a reentrant lock so that a node's
//! rebuild-then-emit step is one critical section, while an observer that
//! mutates the graph from inside a delivery callback on the same thread
//! does not deadlock.

mod animatable;
mod diff;
mod easing;
mod list;
mod object;
mod property;
mod slot;

use std::fmt;
use std::sync::Arc;

use tracing::warn;

pub use animatable::AnimatablePropertyNode;
pub use diff::CollectionDiff;
pub use easing::EasingNode;
pub use list::ListNode;
pub use object::ObjectNode;
pub use property::PropertyNode;

use crate::config::ObservationConfig;
use crate::filter::{PathFilter, TrackedSegments};
use crate::operation::{ChangeOperation, OperationPayload, SequenceNumber};
use crate::sequence::SequenceGenerator;
use crate::source::PropertyRegistry;
use crate::stream::OperationStream;
use crate::suppression::SuppressionScope;
use crate::value::{ObjectId, ObjectRef, Value};
use crate::{ObserveError, Result};

/// Collaborators shared by every node of one observation tree.
#[derive(Clone)]
pub struct ObservationContext {
    registry: Arc<dyn PropertyRegistry>,
    sequence: Arc<SequenceGenerator>,
    suppression: SuppressionScope,
    filter: Option<Arc<PathFilter>>,
    stream: OperationStream,
    detect_cycles: bool,
}

impl fmt::Debug for ObservationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationContext")
            .field("sequence", &self.sequence)
            .field("suppression", &self.suppression)
            .field("filter", &self.filter)
            .field("stream", &self.stream)
            .field("detect_cycles", &self.detect_cycles)
            .finish()
    }
}

impl ObservationContext {
    /// Fresh generator, private suppression scope, no filter, cycle detection on.
    pub fn new(registry: Arc<dyn PropertyRegistry>) -> Self {
        Self {
            registry,
            sequence: Arc::new(SequenceGenerator::new()),
            suppression: SuppressionScope::new(),
            filter: None,
            stream: OperationStream::new(),
            detect_cycles: true,
        }
    }

    pub fn from_settings(
        registry: Arc<dyn PropertyRegistry>,
        config: &ObservationConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ObserveError::Config(e.to_string()))?;
        let mut ctx = Self::new(registry)
            .with_sequence(Arc::new(config.sequence_generator()))
            .with_cycle_detection(config.detect_cycles);
        if let Some(filter) = config.path_filter()? {
            ctx = ctx.with_filter(filter);
        }
        Ok(ctx)
    }

    pub fn with_sequence(mut self, sequence: Arc<SequenceGenerator>) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_suppression_scope(mut self, suppression: SuppressionScope) -> Self {
        self.suppression = suppression;
        self
    }

    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_stream(mut self, stream: OperationStream) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_cycle_detection(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<dyn PropertyRegistry> {
        &self.registry
    }

    pub fn sequence(&self) -> &Arc<SequenceGenerator> {
        &self.sequence
    }

    pub fn suppression(&self) -> &SuppressionScope {
        &self.suppression
    }

    pub fn filter(&self) -> Option<&PathFilter> {
        self.filter.as_deref()
    }

    pub fn operations(&self) -> &OperationStream {
        &self.stream
    }

    pub fn detects_cycles(&self) -> bool {
        self.detect_cycles
    }

    /// Attaches a root node to `object` at the empty path.
    pub fn observe(&self, object: ObjectRef) -> Result<ObjectNode> {
        ObjectNode::attach(object, "", self)
    }

    /// A copy whose filter is [`PathFilter::lifted`] for a subtree at `base`.
    pub(crate) fn lifted(&self, base: &str, segment: &str) -> ObservationContext {
        let mut ctx = self.clone();
        if let Some(filter) = &self.filter {
            ctx.filter = Some(Arc::new(filter.lifted(base, segment)));
        }
        ctx
    }

    pub(crate) fn tracked(&self, path: &str) -> TrackedSegments {
        TrackedSegments::for_path(self.filter(), path)
    }

    /// Registers a new root on the stream; pair with `release_root` on dispose.
    pub(crate) fn open_root(&self) -> Result<()> {
        if self.stream.register_root() {
            Ok(())
        } else {
            Err(ObserveError::Disposed)
        }
    }

    /// Stamps and pushes one operation unless suppression is active.
    ///
    /// The suppression check is the last step before the push; callers
    /// rebuild their children before calling this.
    pub(crate) fn publish(
        &self,
        target: &ObjectRef,
        path: &str,
        payload: OperationPayload,
    ) -> Option<SequenceNumber> {
        if self.suppression.is_active() {
            return None;
        }
        self.stream.emit(&self.sequence, |seq| {
            ChangeOperation::new(seq, target.clone(), path, payload)
        })
    }
}

/// Identities of the composites between the root and a node, used for
/// cycle detection. Persistent: extending never copies the tail.
#[derive(Clone, Default)]
pub(crate) struct Lineage(Option<Arc<LineageLink>>);

struct LineageLink {
    id: ObjectId,
    parent: Lineage,
}

impl Lineage {
    pub(crate) fn with(&self, id: ObjectId) -> Lineage {
        Lineage(Some(Arc::new(LineageLink {
            id,
            parent: self.clone(),
        })))
    }

    pub(crate) fn contains(&self, id: ObjectId) -> bool {
        let mut cur = self.0.as_ref();
        while let Some(link) = cur {
            if link.id == id {
                return true;
            }
            cur = link.parent.0.as_ref();
        }
        false
    }
}

/// One node of the observation tree.
pub enum ObservationNode {
    Object(ObjectNode),
    Property(PropertyNode),
    List(ListNode),
    Animatable(AnimatablePropertyNode),
    Easing(EasingNode),
}

impl ObservationNode {
    pub fn path(&self) -> &str {
        match self {
            ObservationNode::Object(n) => n.path(),
            ObservationNode::Property(n) => n.path(),
            ObservationNode::List(n) => n.path(),
            ObservationNode::Animatable(n) => n.path(),
            ObservationNode::Easing(n) => n.path(),
        }
    }

    /// Idempotent.
    pub fn dispose(&self) {
        match self {
            ObservationNode::Object(n) => n.dispose(),
            ObservationNode::Property(n) => n.dispose(),
            ObservationNode::List(n) => n.dispose(),
            ObservationNode::Animatable(n) => n.dispose(),
            ObservationNode::Easing(n) => n.dispose(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        match self {
            ObservationNode::Object(n) => n.is_disposed(),
            ObservationNode::Property(n) => n.is_disposed(),
            ObservationNode::List(n) => n.is_disposed(),
            ObservationNode::Animatable(n) => n.is_disposed(),
            ObservationNode::Easing(n) => n.is_disposed(),
        }
    }

    pub fn operations(&self) -> &OperationStream {
        match self {
            ObservationNode::Object(n) => n.operations(),
            ObservationNode::Property(n) => n.operations(),
            ObservationNode::List(n) => n.operations(),
            ObservationNode::Animatable(n) => n.operations(),
            ObservationNode::Easing(n) => n.operations(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ObservationNode::Object(_) => "object",
            ObservationNode::Property(_) => "property",
            ObservationNode::List(_) => "list",
            ObservationNode::Animatable(_) => "animatable",
            ObservationNode::Easing(_) => "easing",
        }
    }
}

impl fmt::Debug for ObservationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationNode")
            .field("kind", &self.kind())
            .field("path", &self.path())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Builds the child node matching the shape of `value`, or `None` for leaves.
///
/// `owner` is the composite whose property holds `value`; it becomes the
/// target of operations emitted by list, slot and easing children.
pub(crate) fn spawn_child(
    value: &Value,
    owner: &ObjectRef,
    path: &str,
    ctx: &ObservationContext,
    lineage: &Lineage,
) -> Result<Option<ObservationNode>> {
    let node = match value {
        Value::Object(object) => {
            ObservationNode::Object(ObjectNode::spawn(object.clone(), path, ctx, lineage)?)
        }
        Value::List(list) => ObservationNode::List(ListNode::spawn(
            list.clone(),
            owner.clone(),
            path,
            ctx,
            lineage,
        )),
        Value::Slot(slot) => ObservationNode::Animatable(AnimatablePropertyNode::spawn(
            slot.clone(),
            owner.clone(),
            path,
            ctx,
            lineage,
        )),
        Value::Easing(easing) => {
            ObservationNode::Easing(EasingNode::spawn(easing.clone(), owner.clone(), path, ctx))
        }
        _ => return Ok(None),
    };
    Ok(Some(node))
}

/// [`spawn_child`], downgrading a failed subtree to a leaf.
pub(crate) fn spawn_or_leaf(
    value: &Value,
    owner: &ObjectRef,
    path: &str,
    ctx: &ObservationContext,
    lineage: &Lineage,
) -> Option<ObservationNode> {
    match spawn_child(value, owner, path, ctx, lineage) {
        Ok(node) => node,
        Err(e) => {
            warn!(path, error = %e, "subtree not observed; treating property as leaf");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn lineage_finds_every_ancestor() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let root = Lineage::default().with(a);
        let child = root.with(b);
        assert!(child.contains(a));
        assert!(child.contains(b));
        assert!(!child.contains(c));
        assert!(!root.contains(b));
    }
}
