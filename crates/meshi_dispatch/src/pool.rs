//! Focus points
//!
//! Session-local dispatch budget. The level never leaves [0, capacity];
//! reservation and refund are lock-free compare-and-swap updates so
//! concurrent completions cannot overdraw it.

use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug)]
pub struct FocusPool {
    level: AtomicU32,
    capacity: u32,
}

impl FocusPool {
    /// `initial` is clamped to `capacity`.
    pub fn new(initial: u32, capacity: u32) -> Self {
        Self {
            level: AtomicU32::new(initial.min(capacity)),
            capacity,
        }
    }

    pub fn level(&self) -> u32 {
        self.level.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.level() == 0
    }

    /// Take one point. `false` (and no change) when the pool is empty.
    pub fn try_reserve(&self) -> bool {
        self.level
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Give one point back. `false` when already at capacity.
    pub fn refund(&self) -> bool {
        let capacity = self.capacity;
        self.level
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .is_ok()
    }
}
