use std::fmt;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use uuid::Uuid;

use super::handlers::HandlerSet;
use crate::source::{EasingChangedHandler, ObservableEasing, Subscription};
use crate::value::ObjectId;

const NAMES: [&str; 4] = ["X1", "Y1", "X2", "Y2"];

/// Cubic-bezier easing with control points `(X1, Y1)` and `(X2, Y2)`.
pub struct SplineEasing {
    id: ObjectId,
    points: RwLock<[f64; 4]>,
    handlers: HandlerSet<EasingChangedHandler>,
    raising: ReentrantMutex<()>,
}

impl SplineEasing {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            points: RwLock::new([x1, y1, x2, y2]),
            handlers: HandlerSet::default(),
            raising: ReentrantMutex::new(()),
        })
    }

    pub fn set_x1(&self, v: f64) {
        self.update(|p| p[0] = v);
    }

    pub fn set_y1(&self, v: f64) {
        self.update(|p| p[1] = v);
    }

    pub fn set_x2(&self, v: f64) {
        self.update(|p| p[2] = v);
    }

    pub fn set_y2(&self, v: f64) {
        self.update(|p| p[3] = v);
    }

    /// Sets all four control values with a single notification.
    pub fn set_points(&self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.update(|p| *p = [x1, y1, x2, y2]);
    }

    pub fn points(&self) -> [f64; 4] {
        *self.points.read()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn update(&self, f: impl FnOnce(&mut [f64; 4])) {
        let _raising = self.raising.lock();
        let changed = {
            let mut points = self.points.write();
            let before = *points;
            f(&mut points);
            before != *points
        };
        if changed {
            for handler in self.handlers.snapshot() {
                handler();
            }
        }
    }
}

impl ObservableEasing for SplineEasing {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn parameters(&self) -> Vec<(Arc<str>, f64)> {
        let points = self.points();
        NAMES
            .iter()
            .zip(points)
            .map(|(name, v)| (Arc::from(*name), v))
            .collect()
    }

    fn subscribe_changed(&self, handler: EasingChangedHandler) -> Subscription {
        self.handlers.subscribe(handler)
    }
}

impl fmt::Debug for SplineEasing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplineEasing")
            .field("id", &self.id)
            .field("points", &self.points())
            .finish()
    }
}
