use std::sync::atomic::{AtomicUsize, Ordering};

/// A shared round-robin cursor.
///
/// Every call hands out a distinct position, so concurrent callers never
/// observe the same slot twice nor skip one: `k` callers on a cursor over `n`
/// slots receive `k` consecutive positions modulo `n`.
#[derive(Debug, Default)]
pub struct RoundRobinCursor {
    position: AtomicUsize,
}

impl RoundRobinCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the next index in `[0, len)` and advances the cursor, wrapping at
    /// `len`. Returns `None` when `len` is zero.
    ///
    /// Use this when `len` is fixed for the lifetime of the cursor.
    pub fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let claimed = self
            .position
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| Some((p + 1) % len))
            .unwrap_or_else(|p| p);
        // The stored position may predate a different `len`.
        Some(claimed % len)
    }

    /// Claims the next monotonic ticket. Callers reduce it modulo whatever
    /// length they observe at read time.
    pub fn next_ticket(&self) -> usize {
        self.position.fetch_add(1, Ordering::AcqRel)
    }

    /// Current position without advancing.
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }
}
