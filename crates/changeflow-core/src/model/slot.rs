use std::fmt;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use uuid::Uuid;

use super::handlers::HandlerSet;
use crate::source::{
    AnimatableSlot, SlotAspect, SlotCapabilities, SlotChange, SlotChangedHandler, Subscription,
};
use crate::value::{ObjectId, Value};

#[derive(Default)]
struct SlotValues {
    current: Value,
    animation: Value,
    expression: Value,
}

/// Reactive animatable property slot.
pub struct AnimatableProperty {
    id: ObjectId,
    name: String,
    capabilities: SlotCapabilities,
    values: RwLock<SlotValues>,
    current_handlers: HandlerSet<SlotChangedHandler>,
    animation_handlers: HandlerSet<SlotChangedHandler>,
    expression_handlers: HandlerSet<SlotChangedHandler>,
    /// Held from write through notification so handlers see writes in order.
    raising: ReentrantMutex<()>,
}

impl AnimatableProperty {
    pub fn new(
        name: impl Into<String>,
        capabilities: SlotCapabilities,
        initial: impl Into<Value>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            capabilities,
            values: RwLock::new(SlotValues {
                current: initial.into(),
                ..SlotValues::default()
            }),
            current_handlers: HandlerSet::default(),
            animation_handlers: HandlerSet::default(),
            expression_handlers: HandlerSet::default(),
            raising: ReentrantMutex::new(()),
        })
    }

    pub fn set_value(&self, value: impl Into<Value>) {
        self.assign(SlotAspect::CurrentValue, value.into());
    }

    /// Ignored when the slot is not animatable.
    pub fn set_animation(&self, animation: impl Into<Value>) {
        if self.capabilities.animatable {
            self.assign(SlotAspect::Animation, animation.into());
        }
    }

    /// Ignored when the slot does not support expressions.
    pub fn set_expression(&self, expression: impl Into<Value>) {
        if self.capabilities.expressions {
            self.assign(SlotAspect::Expression, expression.into());
        }
    }

    /// Live subscriptions across all aspects.
    pub fn handler_count(&self) -> usize {
        self.current_handlers.len() + self.animation_handlers.len() + self.expression_handlers.len()
    }

    fn handlers(&self, aspect: SlotAspect) -> &HandlerSet<SlotChangedHandler> {
        match aspect {
            SlotAspect::CurrentValue => &self.current_handlers,
            SlotAspect::Animation => &self.animation_handlers,
            SlotAspect::Expression => &self.expression_handlers,
        }
    }

    fn assign(&self, aspect: SlotAspect, new_value: Value) {
        let _raising = self.raising.lock();
        let old_value = {
            let mut values = self.values.write();
            let slot = match aspect {
                SlotAspect::CurrentValue => &mut values.current,
                SlotAspect::Animation => &mut values.animation,
                SlotAspect::Expression => &mut values.expression,
            };
            if *slot == new_value {
                return;
            }
            std::mem::replace(slot, new_value.clone())
        };
        let change = SlotChange {
            aspect,
            old_value,
            new_value,
        };
        for handler in self.handlers(aspect).snapshot() {
            handler(&change);
        }
    }
}

impl AnimatableSlot for AnimatableProperty {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> SlotCapabilities {
        self.capabilities
    }

    fn current_value(&self) -> Value {
        self.values.read().current.clone()
    }

    fn animation(&self) -> Value {
        self.values.read().animation.clone()
    }

    fn expression(&self) -> Value {
        self.values.read().expression.clone()
    }

    fn subscribe(&self, aspect: SlotAspect, handler: SlotChangedHandler) -> Subscription {
        self.handlers(aspect).subscribe(handler)
    }
}

impl fmt::Debug for AnimatableProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimatableProperty")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn aspects_notify_independently() {
        let slot = AnimatableProperty::new("Opacity", SlotCapabilities::FULL, 1.0);
        let values = Arc::new(AtomicUsize::new(0));
        let v = values.clone();
        let _sub = slot.subscribe(
            SlotAspect::CurrentValue,
            Arc::new(move |_| {
                v.fetch_add(1, Ordering::SeqCst);
            }),
        );

        slot.set_value(0.5);
        slot.set_value(0.5);
        slot.set_expression("time * 2");

        assert_eq!(values.load(Ordering::SeqCst), 1);
        assert_eq!(slot.expression(), Value::from("time * 2"));
    }

    #[test]
    fn plain_slot_ignores_animation_and_expression() {
        let slot = AnimatableProperty::new("Name", SlotCapabilities::PLAIN, "a");
        slot.set_animation(1);
        slot.set_expression("x");
        assert!(slot.animation().is_null());
        assert!(slot.expression().is_null());
    }
}
