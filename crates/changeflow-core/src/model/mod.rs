//! In-memory reactive object model implementing every collaborator contract
//! of [`crate::source`]. Embedding applications with their own object graph
//! implement those traits directly instead.

mod easing;
mod handlers;
mod list;
mod object;
mod registry;
mod slot;

pub use easing::SplineEasing;
pub use list::CoreList;
pub use object::CoreObject;
pub use registry::{TypeDefinition, TypeRegistry, PARENT_PROPERTY, PARENT_PROPERTY_NAME};
pub use slot::AnimatableProperty;
