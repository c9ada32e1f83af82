use super::slot::{AspectLayout, Recurse, SlotLayout, SlotNode};
use super::{Lineage, ObservationContext};
use crate::operation::UpdateKind;
use crate::source::SlotAspect;
use crate::stream::OperationStream;
use crate::value::{ObjectRef, SlotRef};
use crate::Result;

static NODE_ITEM_LAYOUT: SlotLayout = SlotLayout {
    label: "node-item",
    value: AspectLayout {
        aspect: SlotAspect::CurrentValue,
        filter_name: "Property",
        suffix: Some("Property"),
        kind: UpdateKind::NodeItemProperty,
        recurse: Recurse::AnyShape,
    },
    animation: AspectLayout {
        aspect: SlotAspect::Animation,
        filter_name: "Animation",
        suffix: Some("Animation"),
        kind: UpdateKind::NodeItemAnimation,
        recurse: Recurse::ObjectOnly,
    },
    expression: None,
};

/// Observes the single value slot of a node item, at the item's own path.
///
/// Value changes are reported at `path.Property`, animation changes at
/// `path.Animation`. Dropping the node disposes it.
pub struct PropertyNode {
    node: SlotNode,
}

impl PropertyNode {
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
                &NODE_ITEM_LAYOUT,
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
            node: SlotNode::create(slot, owner, path, ctx, lineage, &NODE_ITEM_LAYOUT, false),
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

    pub fn is_disposed(&self) -> bool {
        self.node.is_disposed()
    }

    pub fn dispose(&self) {
        self.node.dispose();
    }
}
