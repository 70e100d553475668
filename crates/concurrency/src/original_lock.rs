//! Per-original critical sections (spec.md §5 "Shared-resource policy":
//! "Original iterator: shared by clones; fields mutated only through
//! `evolve` / `statistics` / cache-producer drive... Result cache:
//! append-only; writers must hold the original's write logical-lock").
//!
//! Every clone of an iterator tree shares one "original" — the node that
//! owns the result cache and the mutable statistics/evolve state. Many
//! clones may be driven concurrently (one per concurrent request), so
//! mutation of the original's shared fields is funneled through a lock
//! keyed by the original's identity, grounded on the teacher's
//! per-branch `DashMap<BranchId, Mutex<()>>` commit-lock pattern in
//! `crates/concurrency/src/manager.rs`.

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Identifies one original iterator node within a query's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OriginalId(pub u64);

/// A held critical section on one original. Dropping it releases the
/// lock.
pub struct OriginalGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// Registry of per-original locks. In the common single-threaded
/// deployment spec.md describes, acquiring a guard never contends; under
/// genuine concurrency it serializes `statistics`/`evolve`/cache-producer
/// drive against other clones of the same original.
#[derive(Default)]
pub struct OriginalLocks {
    locks: DashMap<OriginalId, Arc<Mutex<()>>>,
}

impl OriginalLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        OriginalLocks {
            locks: DashMap::new(),
        }
    }

    /// Acquire the critical section for `id`, blocking until available.
    /// The returned guard's lifetime is tied to an `Arc` kept alive
    /// internally, so it is safe to hold across an `.await`-free budget
    /// step even after other clones register new locks.
    pub fn lock(&self, id: OriginalId) -> OriginalLockHandle {
        let mutex = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        OriginalLockHandle { mutex }
    }

    /// Drop the entry for `id` once its original iterator is torn down,
    /// so the registry does not grow unboundedly across a long-lived
    /// database handle.
    pub fn forget(&self, id: OriginalId) {
        self.locks.remove(&id);
    }

    /// Number of originals currently tracked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }
}

/// An owned handle to one original's lock, from which a guard can be
/// acquired.
pub struct OriginalLockHandle {
    mutex: Arc<Mutex<()>>,
}

impl OriginalLockHandle {
    /// Acquire the critical section.
    pub fn enter(&self) -> OriginalGuard<'_> {
        OriginalGuard {
            _guard: self.mutex.lock(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    #[test]
    fn same_original_serializes_writers() {
        let locks = Arc::new(OriginalLocks::new());
        let counter = Arc::new(AtomicU64::new(0));
        let id = OriginalId(1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                let handle = locks.lock(id);
                for _ in 0..1000 {
                    let _guard = handle.enter();
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 8000);
    }

    #[test]
    fn distinct_originals_do_not_share_a_lock() {
        let locks = OriginalLocks::new();
        let a = locks.lock(OriginalId(1));
        let b = locks.lock(OriginalId(2));
        let _ga = a.enter();
        // Must not deadlock: different originals, independent locks.
        let _gb = b.enter();
    }

    #[test]
    fn forget_drops_the_entry() {
        let locks = OriginalLocks::new();
        let _ = locks.lock(OriginalId(1));
        assert_eq!(locks.len(), 1);
        locks.forget(OriginalId(1));
        assert_eq!(locks.len(), 0);
    }
}
