use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

static GLOBAL: Lazy<SuppressionScope> = Lazy::new(SuppressionScope::new);

/// Shared flag that silences every emission site while active.
///
/// Used while replaying an externally received operation onto the local
/// graph so the replay does not echo back into the stream. Clones share
/// the same flag; independent scopes do not interfere.
///
/// The flag is a count of open scopes across all threads, so it stays set
/// until the last overlapping scope exits.
#[derive(Debug, Clone, Default)]
pub struct SuppressionScope {
    depth: Arc<AtomicUsize>,
}

impl SuppressionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single process-wide scope.
    pub fn global() -> SuppressionScope {
        GLOBAL.clone()
    }

    pub fn is_active(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    /// Holds the flag set until the returned guard drops.
    pub fn enter(&self) -> SuppressionGuard<'_> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        SuppressionGuard { depth: &self.depth }
    }

    /// Runs `f` with the flag set. The scope is released on every exit
    /// path, including unwinding.
    pub fn with_suppression<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    pub fn shares_flag_with(&self, other: &SuppressionScope) -> bool {
        Arc::ptr_eq(&self.depth, &other.depth)
    }
}

#[must_use = "suppression ends when the guard drops"]
pub struct SuppressionGuard<'a> {
    depth: &'a AtomicUsize,
}

impl Drop for SuppressionGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}
