//! Named Advisory Locks
//!
//! Transaction-scoped mutual exclusion keyed by name rather than by row.
//! Used where the "next" value is derived by scanning existing rows (period
//! name generation), so no counter row exists to lock.

use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::sync::Arc;

/// Owned guard for a named advisory lock. The name stays held until drop.
pub type AdvisoryGuard = ArcMutexGuard<RawMutex, ()>;

/// Registry of named advisory locks.
///
/// Distinct names never contend; callers acquiring the same name block
/// until the current holder drops its guard.
pub struct AdvisoryLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AdvisoryLocks {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock for `name`, blocking until it is free.
    pub fn acquire(&self, name: &str) -> AdvisoryGuard {
        let slot = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        slot.lock_arc()
    }
}

impl Default for AdvisoryLocks {
    fn default() -> Self {
        Self::new()
    }
}
