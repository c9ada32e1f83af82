use std::sync::atomic::{AtomicU64, Ordering};

use tracing::error;

use crate::operation::SequenceNumber;

/// Monotonic counter shared by every node of one observation tree.
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceGenerator {
    /// First value handed out is 1; 0 never appears on a stamped operation.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: SequenceNumber) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Strictly increasing across the generator's lifetime, never reused.
    ///
    /// Saturates at `SequenceNumber::MAX`, which is never handed out as a
    /// fresh number; reaching it is reported as an error.
    pub fn next(&self) -> SequenceNumber {
        match self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
        {
            Ok(n) => n,
            Err(n) => {
                error!("sequence numbers exhausted");
                debug_assert!(false, "sequence numbers exhausted");
                n
            }
        }
    }

    /// The value the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> SequenceNumber {
        self.next.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn strictly_increasing() {
        let g = SequenceGenerator::new();
        let a = g.next();
        let b = g.next();
        let c = g.next();
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(g.peek(), 4);
    }

    #[test]
    fn starting_at_offset() {
        let g = SequenceGenerator::starting_at(100);
        assert_eq!(g.next(), 100);
        assert_eq!(g.next(), 101);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "sequence numbers exhausted")]
    fn exhaustion_is_a_debug_assertion() {
        let g = SequenceGenerator::starting_at(SequenceNumber::MAX - 1);
        assert_eq!(g.next(), SequenceNumber::MAX - 1);
        g.next();
    }

    #[test]
    fn no_repeats_across_threads() {
        let g = Arc::new(SequenceGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let g = g.clone();
                thread::spawn(move || (0..1000).map(|_| g.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for n in h.join().unwrap() {
                assert!(seen.insert(n), "duplicate sequence number {}", n);
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
