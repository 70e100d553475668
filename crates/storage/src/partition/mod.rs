//! Physical partition formats layered over the tile cache (spec.md §4.1
//! "Partition", §6 "On-disk partition formats").
//!
//! Each submodule owns one bit-exact layout. All multi-byte integers in
//! every format here are big-endian, matching spec.md §6's blanket rule —
//! a deliberate contrast with `gravel_durability`'s backup log, which is
//! little-endian because spec.md never pins its byte order down.

pub mod flat;
pub mod gmap;
pub mod hmap;
pub mod istore;

pub use flat::FlatPartition;
pub use gmap::GmapPartition;
pub use hmap::HmapPartition;
pub use istore::{IstoreMarker, IstorePartition};
