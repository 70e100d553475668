//! Cross-request coordination primitives (spec.md §5 "Concurrency &
//! resource model").
//!
//! Three concerns live here, each protecting a different piece of shared
//! state the scheduling model calls out: per-original critical sections
//! for the result cache and statistics/evolve state, background-thread
//! coordination for checkpoint fsync, and sabotage/deadline delivery for
//! cooperative cancellation. Tile refcounting itself is a `gravel_storage`
//! concern, not this crate's — spec.md treats "refcount is the lock" as
//! local to the tile cache.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fsync_ctx;
pub mod original_lock;
pub mod sabotage;

pub use fsync_ctx::{FsyncCtx, FsyncOutcome};
pub use original_lock::{OriginalGuard, OriginalId, OriginalLockHandle, OriginalLocks};
pub use sabotage::Sabotage;
