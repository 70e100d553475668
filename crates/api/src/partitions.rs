//! Fixed partition layout for one open database (spec.md §4.1
//! "Partition", §3 "Backup horizon `H`").
//!
//! A `gravel-api` database is a directory of files, each backing exactly
//! one [`gravel_storage::PartitionId`]. The layout is fixed rather than
//! discovered, since this crate only ever opens the one fixed set of
//! partitions a single-node embedded database needs.

use gravel_storage::PartitionId;
use std::path::{Path, PathBuf};

/// Primitive bodies (an istore partition).
pub const PRIMITIVES: PartitionId = PartitionId(0);
/// The next-id watermark for primitive allocation (an istore marker file).
pub const NEXT_ID_MARKER: PartitionId = PartitionId(1);

/// Typeguid index: HMAP buckets.
pub const TYPEGUID_HMAP: PartitionId = PartitionId(2);
/// Typeguid index: GMAP overflow chain pages.
pub const TYPEGUID_GMAP: PartitionId = PartitionId(3);
/// Typeguid index: flat key region.
pub const TYPEGUID_KEYS: PartitionId = PartitionId(4);

/// Left-endpoint index: HMAP buckets.
pub const LEFT_HMAP: PartitionId = PartitionId(5);
/// Left-endpoint index: GMAP overflow chain pages.
pub const LEFT_GMAP: PartitionId = PartitionId(6);
/// Left-endpoint index: flat key region.
pub const LEFT_KEYS: PartitionId = PartitionId(7);

/// Right-endpoint index: HMAP buckets.
pub const RIGHT_HMAP: PartitionId = PartitionId(8);
/// Right-endpoint index: GMAP overflow chain pages.
pub const RIGHT_GMAP: PartitionId = PartitionId(9);
/// Right-endpoint index: flat key region.
pub const RIGHT_KEYS: PartitionId = PartitionId(10);

/// File names for every partition above, relative to a database's base
/// directory.
pub fn file_for(base_dir: &Path, id: PartitionId) -> PathBuf {
    let name = match id {
        PRIMITIVES => "primitives.istore",
        NEXT_ID_MARKER => "primitives.next_id",
        TYPEGUID_HMAP => "typeguid.hmap",
        TYPEGUID_GMAP => "typeguid.gmap",
        TYPEGUID_KEYS => "typeguid.keys",
        LEFT_HMAP => "left.hmap",
        LEFT_GMAP => "left.gmap",
        LEFT_KEYS => "left.keys",
        RIGHT_HMAP => "right.hmap",
        RIGHT_GMAP => "right.gmap",
        RIGHT_KEYS => "right.keys",
        _ => unreachable!("partition layout is fixed"),
    };
    base_dir.join(name)
}

/// The backup log file.
pub fn backup_log_path(base_dir: &Path) -> PathBuf {
    base_dir.join("BACKUP")
}

/// The checkpoint horizon marker file.
pub fn horizon_path(base_dir: &Path) -> PathBuf {
    base_dir.join("HORIZON")
}

/// A scratch backup log used only to satisfy [`gravel_storage::TileCache`]'s
/// write API while replaying pre-images during rollback; these writes must
/// never themselves be recorded as new pre-images, and the scratch log is
/// discarded immediately after.
pub fn rollback_scratch_path(base_dir: &Path) -> PathBuf {
    base_dir.join("ROLLBACK_SCRATCH")
}
