use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::trace;

static GLOBAL: OnceLock<Arc<WorkerBudget>> = OnceLock::new();

/// A bounded count of extra workers that parallel searches may borrow.
///
/// Slots are taken with [`WorkerBudget::reserve`] and handed back when the
/// returned [`SlotGuard`]s drop, so an early return or a panic inside a
/// branch never leaks capacity. The lock is only held while the counter
/// changes.
#[derive(Debug)]
pub struct WorkerBudget {
    capacity: usize,
    available: Mutex<usize>,
}

impl WorkerBudget {
    pub fn new(capacity: usize) -> Self { Self { capacity, available: Mutex::new(capacity) } }

    /// Process-wide budget sized to one less than the rayon pool.
    pub fn global() -> Arc<WorkerBudget> {
        GLOBAL
            .get_or_init(|| Arc::new(WorkerBudget::new(rayon::current_num_threads().saturating_sub(1))))
            .clone()
    }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn available(&self) -> usize { *self.lock() }

    /// Take up to `wanted` slots; fewer (possibly none) when the budget is short.
    pub fn reserve(&self, wanted: usize) -> Vec<SlotGuard<'_>> {
        if wanted == 0 {
            return Vec::new();
        }
        let granted = {
            let mut available = self.lock();
            let granted = (*available).min(wanted);
            *available -= granted;
            granted
        };
        if granted > 0 {
            trace!(granted, wanted, "reserved worker slots");
        }
        (0..granted).map(|_| SlotGuard { budget: self }).collect()
    }

    fn release(&self) {
        let mut available = self.lock();
        debug_assert!(*available < self.capacity, "worker slot released twice");
        *available += 1;
    }

    fn lock(&self) -> MutexGuard<'_, usize> { self.available.lock().unwrap_or_else(PoisonError::into_inner) }
}

/// One reserved worker slot. Dropping it returns the slot.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    budget: &'a WorkerBudget,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) { self.budget.release(); }
}
