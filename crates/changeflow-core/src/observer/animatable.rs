use super::slot::{AspectLayout, Recurse, SlotLayout, SlotNode};
use super::{Lineage, ObservationContext};
use crate::operation::UpdateKind;
use crate::source::SlotAspect;
use crate::stream::OperationStream;
use crate::value::{ObjectRef, SlotRef};
use crate::Result;

static ANIMATABLE_LAYOUT: SlotLayout = SlotLayout {
    label: "animatable",
    value: AspectLayout {
        aspect: SlotAspect::CurrentValue,
        filter_name: "CurrentValue",
        suffix: None,
        kind: UpdateKind::Property,
        recurse: Recurse::AnyShape,
    },
    animation: AspectLayout {
        aspect: SlotAspect::Animation,
        filter_name: "Animation",
        suffix: Some("Animation"),
        kind: UpdateKind::NodeItemAnimation,
        recurse: Recurse::ObjectOnly,
    },
    expression: Some(AspectLayout {
        aspect: SlotAspect::Expression,
        filter_name: "Expression",
        suffix: Some("Expression"),
        kind: UpdateKind::NodeItemExpression,
        recurse: Recurse::Never,
    }),
};

/// Observes an animatable property slot.
///
/// - current value: reported at the node path itself, rebuilding a child
///   for composite or list values;
/// - animation (animatable slots only): reported at `path.Animation`,
///   rebuilding a child when the animation is a composite;
/// - expression (expression-capable slots only): reported at
///   `path.Expression`, never recursed into.
///
/// Each aspect subscribes only if the path filter allows its name
/// (`CurrentValue`, `Animation`, `Expression`). Dropping the node disposes it.
pub struct AnimatablePropertyNode {
    node: SlotNode,
}

impl AnimatablePropertyNode {
    /// Attaches a root node; operations target `owner`.
    pub fn attach(
        slot: SlotRef,
        owner: ObjectRef,
        path: &str,
        ctx: &ObservationContext,
    ) -> Result<Self> {
        ctx.open_root()?;
        Ok(Self {
            node: SlotNode::create(
                slot,
                owner,
                path,
                ctx,
                &Lineage::default(),
                &ANIMATABLE_LAYOUT,
                true,
            ),
        })
    }

    pub(crate) fn spawn(
        slot: SlotRef,
        owner: ObjectRef,
        path: &str,
        ctx: &ObservationContext,
        lineage: &Lineage,
    ) -> Self {
        Self {
            node: SlotNode::create(slot, owner, path, ctx, lineage, &ANIMATABLE_LAYOUT, false),
        }
    }

    pub fn path(&self) -> &str {
        self.node.path()
    }

    pub fn slot(&self) -> &SlotRef {
        self.node.slot()
    }

    pub fn operations(&self) -> &OperationStream {
        self.node.operations()
    }

    /// Number of aspects actually subscribed.
    pub fn tracked_aspects(&self) -> usize {
        self.node.subscription_count()
    }

    pub fn has_child(&self, aspect: SlotAspect) -> bool {
        self.node.has_child(aspect)
    }

    pub fn is_disposed(&self) -> bool {
        self.node.is_disposed()
    }

    pub fn dispose(&self) {
        self.node.dispose();
    }
}
