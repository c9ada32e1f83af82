use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::source::{AnimatableSlot, ObservableEasing, ObservableList, ObservableObject};

/// Stable identity of an observable object, list, slot or easing.
pub type ObjectId = Uuid;

pub type ObjectRef = Arc<dyn ObservableObject>;
pub type ListRef = Arc<dyn ObservableList>;
pub type SlotRef = Arc<dyn AnimatableSlot>;
pub type EasingRef = Arc<dyn ObservableEasing>;

/// A raw property value as seen by the observer tree.
///
/// Scalars compare by value; references compare by identity, so two
/// distinct composites with equal contents are never equal.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Arc<str>),
    Object(ObjectRef),
    List(ListRef),
    Slot(SlotRef),
    Easing(EasingRef),
}

/// Structural shape of a value, used to pick the child node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueShape {
    Leaf,
    Composite,
    List,
    Slot,
    Easing,
}

impl Value {
    pub fn object<T: ObservableObject + 'static>(object: Arc<T>) -> Self {
        Value::Object(object)
    }

    pub fn list<T: ObservableList + 'static>(list: Arc<T>) -> Self {
        Value::List(list)
    }

    pub fn slot<T: AnimatableSlot + 'static>(slot: Arc<T>) -> Self {
        Value::Slot(slot)
    }

    pub fn easing<T: ObservableEasing + 'static>(easing: Arc<T>) -> Self {
        Value::Easing(easing)
    }

    pub fn shape(&self) -> ValueShape {
        match self {
            Value::Object(_) => ValueShape::Composite,
            Value::List(_) => ValueShape::List,
            Value::Slot(_) => ValueShape::Slot,
            Value::Easing(_) => ValueShape::Easing,
            _ => ValueShape::Leaf,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Identity of the referenced object, or `None` for scalars.
    pub fn identity(&self) -> Option<ObjectId> {
        match self {
            Value::Object(o) => Some(o.id()),
            Value::List(l) => Some(l.id()),
            Value::Slot(s) => Some(s.id()),
            Value::Easing(e) => Some(e.id()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.id() == b.id(),
            (Value::List(a), Value::List(b)) => a.id() == b.id(),
            (Value::Slot(a), Value::Slot(b)) => a.id() == b.id(),
            (Value::Easing(a), Value::Easing(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Text(s) => write!(f, "Text({:?})", s),
            Value::Object(o) => write!(f, "Object({} {})", o.type_name(), o.id()),
            Value::List(l) => write!(f, "List({})", l.id()),
            Value::Slot(s) => write!(f, "Slot({} {})", s.name(), s.id()),
            Value::Easing(e) => write!(f, "Easing({})", e.id()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Arc::from(v))
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<ListRef> for Value {
    fn from(v: ListRef) -> Self {
        Value::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
