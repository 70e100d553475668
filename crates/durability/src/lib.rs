//! Backup log, checkpoint horizon, and rollback (spec.md §4.1).
//!
//! This crate owns the durability half of the tiled storage layer: the
//! append-only log of tile pre-images and the two-phase horizon-advance
//! protocol that lets a checkpoint become durable and then discard
//! everything rollback would no longer need. It knows nothing about
//! tiles or partitions itself — `gravel-storage` calls back into it with
//! raw `(file_id, byte_offset, bytes)` triples, and supplies the flush
//! closure `Checkpoint::start` runs before a horizon is allowed to
//! advance.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backup_log;
pub mod error;
pub mod horizon;

pub use backup_log::{BackupLog, BackupRecord};
pub use error::{DurabilityError, Result};
pub use horizon::Checkpoint;
