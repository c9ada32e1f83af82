use std::fmt;
use std::sync::Arc;

use crate::value::{ObjectRef, Value};

pub type SequenceNumber = u64;

/// Discriminates what an [`OperationPayload::UpdateValue`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Property,
    NodeItemProperty,
    NodeItemAnimation,
    NodeItemExpression,
    EasingParameter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationPayload {
    InsertRange {
        index: usize,
        items: Vec<Value>,
    },
    RemoveRange {
        index: usize,
        items: Vec<Value>,
    },
    MoveRange {
        old_index: usize,
        new_index: usize,
        count: usize,
    },
    UpdateValue {
        kind: UpdateKind,
        new_value: Value,
        old_value: Value,
    },
}

impl OperationPayload {
    pub fn update(kind: UpdateKind, new_value: Value, old_value: Value) -> Self {
        OperationPayload::UpdateValue {
            kind,
            new_value,
            old_value,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperationPayload::InsertRange { .. } => "InsertRange",
            OperationPayload::RemoveRange { .. } => "RemoveRange",
            OperationPayload::MoveRange { .. } => "MoveRange",
            OperationPayload::UpdateValue { kind, .. } => match kind {
                UpdateKind::Property => "UpdateValue",
                UpdateKind::NodeItemProperty
                | UpdateKind::NodeItemAnimation
                | UpdateKind::NodeItemExpression => "UpdateNodeItem",
                UpdateKind::EasingParameter => "UpdateEasing",
            },
        }
    }
}

/// One sequenced record describing a single observed mutation.
///
/// Immutable once constructed. The sequence number is the total-order key
/// across one observation tree.
#[derive(Clone)]
pub struct ChangeOperation {
    sequence_number: SequenceNumber,
    target: ObjectRef,
    property_path: Arc<str>,
    payload: OperationPayload,
}

impl ChangeOperation {
    pub fn new(
        sequence_number: SequenceNumber,
        target: ObjectRef,
        property_path: impl Into<Arc<str>>,
        payload: OperationPayload,
    ) -> Self {
        let property_path = property_path.into();
        debug_assert!(
            property_path.is_empty() || property_path.split('.').all(|s| !s.is_empty()),
            "empty path segment in {:?}",
            property_path
        );
        Self {
            sequence_number,
            target,
            property_path,
            payload,
        }
    }

    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }

    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    pub fn property_path(&self) -> &str {
        &self.property_path
    }

    pub fn payload(&self) -> &OperationPayload {
        &self.payload
    }

    pub fn update_kind(&self) -> Option<UpdateKind> {
        match &self.payload {
            OperationPayload::UpdateValue { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// `(new, old)` for update operations.
    pub fn values(&self) -> Option<(&Value, &Value)> {
        match &self.payload {
            OperationPayload::UpdateValue {
                new_value,
                old_value,
                ..
            } => Some((new_value, old_value)),
            _ => None,
        }
    }
}

impl fmt::Debug for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeOperation")
            .field("sequence_number", &self.sequence_number)
            .field("target", &format_args!("{} {}", self.target.type_name(), self.target.id()))
            .field("property_path", &self.property_path)
            .field("payload", &self.payload)
            .finish()
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {}",
            self.sequence_number,
            self.payload.name(),
            self.property_path
        )
    }
}
