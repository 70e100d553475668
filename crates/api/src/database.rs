//! The embeddable database handle (spec.md §2 "Tile cache", §4.1
//! "Backup log and checkpoint", §4.5 "Query execution").
//!
//! [`Database`] wires the whole stack together: a [`TileCache`] shared by
//! every partition, a [`BackupLog`] and [`Checkpoint`] for durability, an
//! istore-backed [`PrimitiveStore`], and one [`FieldIndex`] per linkage
//! field a query can constrain. [`Database::query`] is the one place the
//! rest of the crates in this workspace meet: it builds leaves through
//! `gravel_executor::plan`, commits them through `gravel_engine`'s
//! optimizer, and hands back a [`Cursor`] that pages results through
//! `gravel_executor::page`.

use crate::cursor::Cursor;
use crate::index::{FieldIndex, FieldIndexIds};
use crate::partitions;
use crate::store::PrimitiveStore;
use gravel_core::id::{Id, IdRange};
use gravel_core::primitive::{Primitive, Value};
use gravel_core::{Budget, Direction, Error, Result, StoreConfig};
use gravel_durability::{BackupLog, Checkpoint};
use gravel_executor::{build_and_commit, CommitOutcome, ConstraintSpec, Field, LinkageLookup};
use gravel_storage::{AccessMode, PartitionId, TileCache};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const INDEX_SLOTS: u64 = 4096;
const INDEX_PAGE_CAPACITY: u32 = 64;

struct DbLookup<'a> {
    cache: &'a TileCache,
    typeguid: &'a FieldIndex,
    left: &'a FieldIndex,
    right: &'a FieldIndex,
}

impl LinkageLookup for DbLookup<'_> {
    fn lookup(&self, field: Field, value: Id, direction: Direction) -> Result<Option<gravel_primitives::IdArray>> {
        let index = match field {
            Field::TypeGuid => self.typeguid,
            Field::Left => self.left,
            Field::Right => self.right,
        };
        index.lookup(self.cache, value, direction)
    }
}

/// An open Gravel database.
pub struct Database {
    base_dir: PathBuf,
    cache: TileCache,
    backup: BackupLog,
    checkpoint: Checkpoint,
    primitives: PrimitiveStore,
    typeguid_index: FieldIndex,
    left_index: FieldIndex,
    right_index: FieldIndex,
    config: StoreConfig,
}

fn field_index_ids(hmap: PartitionId, gmap: PartitionId, keys: PartitionId) -> FieldIndexIds {
    FieldIndexIds { hmap, gmap, keys }
}

impl Database {
    /// Create a fresh database rooted at `base_dir`, which must not yet
    /// contain partition files.
    pub fn create(base_dir: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        let cache = TileCache::new(config.tile_size, config.cache_capacity);

        for &id in &[
            partitions::PRIMITIVES,
            partitions::NEXT_ID_MARKER,
            partitions::TYPEGUID_HMAP,
            partitions::TYPEGUID_GMAP,
            partitions::TYPEGUID_KEYS,
            partitions::LEFT_HMAP,
            partitions::LEFT_GMAP,
            partitions::LEFT_KEYS,
            partitions::RIGHT_HMAP,
            partitions::RIGHT_GMAP,
            partitions::RIGHT_KEYS,
        ] {
            cache.open_partition(id, partitions::file_for(&base_dir, id))?;
        }

        let mut backup = BackupLog::create(partitions::backup_log_path(&base_dir), 0)?;
        let checkpoint = Checkpoint::create(partitions::horizon_path(&base_dir))?;

        let primitives = PrimitiveStore::create(&cache, partitions::PRIMITIVES, partitions::NEXT_ID_MARKER, &mut backup)?;
        let typeguid_index = FieldIndex::create(
            &cache,
            field_index_ids(partitions::TYPEGUID_HMAP, partitions::TYPEGUID_GMAP, partitions::TYPEGUID_KEYS),
            INDEX_SLOTS,
            INDEX_PAGE_CAPACITY,
            &mut backup,
        )?;
        let left_index = FieldIndex::create(
            &cache,
            field_index_ids(partitions::LEFT_HMAP, partitions::LEFT_GMAP, partitions::LEFT_KEYS),
            INDEX_SLOTS,
            INDEX_PAGE_CAPACITY,
            &mut backup,
        )?;
        let right_index = FieldIndex::create(
            &cache,
            field_index_ids(partitions::RIGHT_HMAP, partitions::RIGHT_GMAP, partitions::RIGHT_KEYS),
            INDEX_SLOTS,
            INDEX_PAGE_CAPACITY,
            &mut backup,
        )?;

        info!(path = %base_dir.display(), "database_create");
        Ok(Database {
            base_dir,
            cache,
            backup,
            checkpoint,
            primitives,
            typeguid_index,
            left_index,
            right_index,
            config,
        })
    }

    /// Reopen a database previously created at `base_dir`.
    pub fn open(base_dir: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let cache = TileCache::new(config.tile_size, config.cache_capacity);

        for &id in &[
            partitions::PRIMITIVES,
            partitions::NEXT_ID_MARKER,
            partitions::TYPEGUID_HMAP,
            partitions::TYPEGUID_GMAP,
            partitions::TYPEGUID_KEYS,
            partitions::LEFT_HMAP,
            partitions::LEFT_GMAP,
            partitions::LEFT_KEYS,
            partitions::RIGHT_HMAP,
            partitions::RIGHT_GMAP,
            partitions::RIGHT_KEYS,
        ] {
            cache.open_partition(id, partitions::file_for(&base_dir, id))?;
        }

        let backup = BackupLog::open(partitions::backup_log_path(&base_dir))?;
        let checkpoint = Checkpoint::load(partitions::horizon_path(&base_dir))?;

        let primitives = PrimitiveStore::open(&cache, partitions::PRIMITIVES, partitions::NEXT_ID_MARKER)?;
        let typeguid_index = FieldIndex::open(
            &cache,
            field_index_ids(partitions::TYPEGUID_HMAP, partitions::TYPEGUID_GMAP, partitions::TYPEGUID_KEYS),
            INDEX_PAGE_CAPACITY,
        )?;
        let left_index = FieldIndex::open(
            &cache,
            field_index_ids(partitions::LEFT_HMAP, partitions::LEFT_GMAP, partitions::LEFT_KEYS),
            INDEX_PAGE_CAPACITY,
        )?;
        let right_index = FieldIndex::open(
            &cache,
            field_index_ids(partitions::RIGHT_HMAP, partitions::RIGHT_GMAP, partitions::RIGHT_KEYS),
            INDEX_PAGE_CAPACITY,
        )?;

        info!(path = %base_dir.display(), horizon = checkpoint.horizon(), "database_open");
        Ok(Database {
            base_dir,
            cache,
            backup,
            checkpoint,
            primitives,
            typeguid_index,
            left_index,
            right_index,
            config,
        })
    }

    /// Insert a new primitive, indexing whichever of `left`/`right`/
    /// `typeguid` are present.
    pub fn insert(&mut self, left: Option<Id>, right: Option<Id>, typeguid: Option<Id>, payload: Value) -> Result<Primitive> {
        let horizon = self.checkpoint.horizon();
        let primitive = self.primitives.insert(&self.cache, left, right, typeguid, payload, horizon, &mut self.backup)?;

        if let Some(v) = typeguid {
            self.typeguid_index.insert(&self.cache, v, primitive.id, horizon, &mut self.backup)?;
        }
        if let Some(v) = left {
            self.left_index.insert(&self.cache, v, primitive.id, horizon, &mut self.backup)?;
        }
        if let Some(v) = right {
            self.right_index.insert(&self.cache, v, primitive.id, horizon, &mut self.backup)?;
        }
        debug!(id = primitive.id.get(), "primitive_inserted");
        Ok(primitive)
    }

    /// Read back one primitive by id.
    pub fn get(&self, id: Id) -> Result<Primitive> {
        self.primitives.get(&self.cache, id)
    }

    /// Advance the durable checkpoint horizon by one, flushing every dirty
    /// tile first (spec.md §4.1's two-phase write path) and truncating the
    /// backup log of everything that predates it.
    pub fn checkpoint(&mut self) -> Result<u64> {
        let next = self
            .checkpoint
            .horizon()
            .checked_add(1)
            .ok_or_else(|| Error::Corrupt("horizon overflow".into()))?;
        let cache = &self.cache;
        self.checkpoint.start(next, || cache.flush_all())?;
        self.checkpoint.finish(&mut self.backup)?;
        info!(horizon = next, "checkpoint");
        Ok(next)
    }

    /// Discard every write since the last durable checkpoint by replaying
    /// the backup log's pre-images in reverse (spec.md §3 "Rollback
    /// correctness").
    ///
    /// The replay only touches bytes behind the shared [`TileCache`];
    /// every partition wrapper above it (the istore's `next_slot`, each
    /// field index's bucket count) cached that state in memory when it was
    /// opened, so each is reloaded fresh from the now-reverted disk header
    /// once the replay finishes.
    pub fn rollback(&mut self) -> Result<()> {
        let scratch_path = partitions::rollback_scratch_path(&self.base_dir);
        let mut scratch = BackupLog::create(&scratch_path, 0)?;
        let cache = &self.cache;
        self.checkpoint
            .rollback(&mut self.backup, |file_id, offset, bytes| {
                let part = PartitionId(file_id);
                let (_data, handle) = cache
                    .get(part, offset, offset + bytes.len() as u64, AccessMode::ReadWrite, 0, Some(&mut scratch))
                    .map_err(|e| gravel_durability::DurabilityError::Corrupt(e.to_string()))?;
                cache
                    .write(&handle, offset, bytes, 0, &mut scratch)
                    .map_err(|e| gravel_durability::DurabilityError::Corrupt(e.to_string()))?;
                cache.free(handle);
                Ok(())
            })?;
        let _ = std::fs::remove_file(&scratch_path);

        self.primitives = PrimitiveStore::open(&self.cache, partitions::PRIMITIVES, partitions::NEXT_ID_MARKER)?;
        self.typeguid_index = FieldIndex::open(
            &self.cache,
            field_index_ids(partitions::TYPEGUID_HMAP, partitions::TYPEGUID_GMAP, partitions::TYPEGUID_KEYS),
            INDEX_PAGE_CAPACITY,
        )?;
        self.left_index = FieldIndex::open(
            &self.cache,
            field_index_ids(partitions::LEFT_HMAP, partitions::LEFT_GMAP, partitions::LEFT_KEYS),
            INDEX_PAGE_CAPACITY,
        )?;
        self.right_index = FieldIndex::open(
            &self.cache,
            field_index_ids(partitions::RIGHT_HMAP, partitions::RIGHT_GMAP, partitions::RIGHT_KEYS),
            INDEX_PAGE_CAPACITY,
        )?;

        info!("rollback");
        Ok(())
    }

    /// Build and commit the iterator tree for `constraints`, returning a
    /// cursor to page through results (spec.md §4.5.1).
    pub fn query(&self, constraints: &[ConstraintSpec], direction: Direction, budget: &mut Budget) -> Result<Cursor> {
        let lookup = DbLookup {
            cache: &self.cache,
            typeguid: &self.typeguid_index,
            left: &self.left_index,
            right: &self.right_index,
        };
        let range = IdRange {
            low: Id::MIN,
            high: Id::new(Id::MIN.get() + self.primitives.len()).unwrap_or(Id::MAX),
        };
        match build_and_commit(constraints, &lookup, range, direction, budget)? {
            CommitOutcome::Resolved(it) => Ok(Cursor::new(it, direction)),
            CommitOutcome::Suspended(_) => Err(Error::Semantic("query planning exhausted its budget".into())),
        }
    }

    /// The durable checkpoint horizon.
    pub fn horizon(&self) -> u64 {
        self.checkpoint.horizon()
    }

    /// The tunables this database was opened with.
    pub fn config(&self) -> StoreConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravel_core::{Check, Step};

    #[test]
    fn insert_and_point_query_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::create(dir.path(), StoreConfig::default()).unwrap();

        let typeguid = Id::new(500).unwrap();
        let mut inserted = Vec::new();
        for n in 1..=10u64 {
            let p = db
                .insert(Some(Id::new(n).unwrap()), None, Some(typeguid), Value(serde_json::json!(n)))
                .unwrap();
            inserted.push(p.id);
        }

        let mut budget = Budget::new(10_000);
        let mut cursor = db
            .query(&[ConstraintSpec::Equals(Field::TypeGuid, typeguid)], Direction::Forward, &mut budget)
            .unwrap();

        let mut found = Vec::new();
        loop {
            match cursor.iterator_mut().next(&mut budget) {
                Step::Ready(id) => found.push(id),
                Step::EndOfSet => break,
                Step::NeedMoreBudget => panic!("unexpected suspension"),
            }
        }
        assert_eq!(found, inserted);
    }

    #[test]
    fn checkpoint_then_rollback_is_a_no_op_with_nothing_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::create(dir.path(), StoreConfig::default()).unwrap();
        db.insert(None, None, Some(Id::new(1).unwrap()), Value(serde_json::Value::Null)).unwrap();
        db.checkpoint().unwrap();
        assert_eq!(db.horizon(), 1);
        db.rollback().unwrap();
        let p = db.get(Id::MIN).unwrap();
        assert_eq!(p.typeguid, Some(Id::new(1).unwrap()));
    }

    #[test]
    fn unmatched_constraint_reports_no_membership() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::create(dir.path(), StoreConfig::default()).unwrap();
        let mut budget = Budget::new(10_000);
        let mut cursor = db
            .query(&[ConstraintSpec::Equals(Field::TypeGuid, Id::new(1).unwrap())], Direction::Forward, &mut budget)
            .unwrap();
        assert_eq!(cursor.iterator_mut().check(Id::MIN, &mut budget), Check::No);
    }
}
