//! The embeddable database handle: open/checkpoint/rollback and the query
//! cursor surface (spec.md §2 "Overview", §4.1 "Backup log and
//! checkpoint", §4.5 "Query execution").
//!
//! This is the crate an embedder links against. It owns nothing the lower
//! crates don't already define — a [`gravel_storage::TileCache`], a
//! [`gravel_durability::BackupLog`] and `Checkpoint`, and the primitive
//! and field-index partitions layered on top of them (spec.md §4.2) — and
//! wires them to `gravel_executor`'s plan/page functions and
//! `gravel_engine`'s iterator algebra to answer `query`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod database;
pub mod index;
pub mod partitions;
pub mod store;

pub use cursor::Cursor;
pub use database::Database;
pub use gravel_core::{Budget, Direction, Error, Result, StoreConfig};
pub use gravel_core::id::{Id, IdRange};
pub use gravel_core::primitive::{Primitive, Value};
pub use gravel_executor::{ConstraintSpec, Field};
