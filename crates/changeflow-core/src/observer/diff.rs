use crate::operation::OperationPayload;
use crate::source::CollectionChange;
use crate::value::Value;

/// Effect of one collection-change notification on a list node.
///
/// `detach` is applied before `attach`; `operations` are emitted in order,
/// each with its own sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDiff {
    pub detach: Vec<Value>,
    pub attach: Vec<Value>,
    pub operations: Vec<OperationPayload>,
}

impl CollectionDiff {
    /// `None` for notifications that carry no item list (`Reset`).
    pub fn translate(change: &CollectionChange) -> Option<Self> {
        let diff = match change {
            CollectionChange::Add { index, items } => CollectionDiff {
                detach: Vec::new(),
                attach: items.clone(),
                operations: vec![OperationPayload::InsertRange {
                    index: *index,
                    items: items.clone(),
                }],
            },
            CollectionChange::Remove { index, items } => CollectionDiff {
                detach: items.clone(),
                attach: Vec::new(),
                operations: vec![OperationPayload::RemoveRange {
                    index: *index,
                    items: items.clone(),
                }],
            },
            CollectionChange::Move {
                old_index,
                new_index,
                count,
            } => CollectionDiff {
                detach: Vec::new(),
                attach: Vec::new(),
                operations: vec![OperationPayload::MoveRange {
                    old_index: *old_index,
                    new_index: *new_index,
                    count: *count,
                }],
            },
            // Remove is always sequenced before Insert.
            CollectionChange::Replace {
                index,
                old_items,
                new_items,
            } => CollectionDiff {
                detach: old_items.clone(),
                attach: new_items.clone(),
                operations: vec![
                    OperationPayload::RemoveRange {
                        index: *index,
                        items: old_items.clone(),
                    },
                    OperationPayload::InsertRange {
                        index: *index,
                        items: new_items.clone(),
                    },
                ],
            },
            CollectionChange::Reset => return None,
        };
        Some(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_decomposes_into_remove_then_insert() {
        let diff = CollectionDiff::translate(&CollectionChange::Replace {
            index: 2,
            old_items: vec![Value::from("A")],
            new_items: vec![Value::from("B")],
        })
        .unwrap();

        assert_eq!(diff.detach, vec![Value::from("A")]);
        assert_eq!(diff.attach, vec![Value::from("B")]);
        assert_eq!(
            diff.operations,
            vec![
                OperationPayload::RemoveRange {
                    index: 2,
                    items: vec![Value::from("A")]
                },
                OperationPayload::InsertRange {
                    index: 2,
                    items: vec![Value::from("B")]
                },
            ]
        );
    }

    #[test]
    fn move_touches_no_children() {
        let diff = CollectionDiff::translate(&CollectionChange::Move {
            old_index: 3,
            new_index: 0,
            count: 1,
        })
        .unwrap();
        assert!(diff.detach.is_empty() && diff.attach.is_empty());
        assert_eq!(
            diff.operations,
            vec![OperationPayload::MoveRange {
                old_index: 3,
                new_index: 0,
                count: 1
            }]
        );
    }

    #[test]
    fn reset_is_not_translated() {
        assert!(CollectionDiff::translate(&CollectionChange::Reset).is_none());
    }
}
