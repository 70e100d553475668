//! A hashed field index: open-addressed HMAP buckets over a flat key
//! region, chaining into GMAP pages once a field value has more than one
//! match (spec.md §6 "HMAP header", "HMAP bucket", §4.2 "gmap chain").
//!
//! `gravel_storage::HmapPartition` stores a bucket's key as an offset and
//! length into some separate "key region" it never defines itself (the
//! module's own doc comment calls this out). Here that key region is a
//! plain [`FlatPartition`]: slot `n`'s key always lives at byte `n * 5`,
//! so the hmap's `key_offset` field is redundant with the slot number and
//! only `key_len` is consulted to tell an empty slot from an occupied one.

use gravel_core::id::{decode_id5, encode_id5, Id};
use gravel_core::{Direction, Error, Result};
use gravel_durability::BackupLog;
use gravel_primitives::IdArray;
use gravel_storage::partition::hmap::{Bucket, BucketValue};
use gravel_storage::{FlatPartition, GmapPartition, HmapPartition, PartitionId, TileCache};

const KEY_LEN: u64 = 5;
const HMAP_PAGE_SIZE: u32 = 64;

/// The three partitions backing one [`FieldIndex`].
#[derive(Debug, Clone, Copy)]
pub struct FieldIndexIds {
    /// Bucket slots.
    pub hmap: PartitionId,
    /// Overflow chain pages for fields with more than one match.
    pub gmap: PartitionId,
    /// Flat key region, one 5-byte id per slot.
    pub keys: PartitionId,
}

/// One field's hashed equality index (spec.md §4.5.1's "VIP/HMAP lookup"
/// producers plug in here, though this crate builds the index rather than
/// a VIP fast path).
pub struct FieldIndex {
    hmap: HmapPartition,
    gmap: GmapPartition,
    keys: FlatPartition,
    n_slots: u64,
    page_capacity: u32,
}

impl FieldIndex {
    /// Initialize all three partitions for a fresh index.
    pub fn create(
        cache: &TileCache,
        ids: FieldIndexIds,
        n_slots: u64,
        page_capacity: u32,
        backup: &mut BackupLog,
    ) -> Result<Self> {
        let hmap = HmapPartition::create(cache, ids.hmap, HMAP_PAGE_SIZE, n_slots, backup)?;
        let gmap = GmapPartition::create(cache, ids.gmap, page_capacity)?;
        let keys = FlatPartition::create(cache, ids.keys, backup)?;
        Ok(FieldIndex {
            hmap,
            gmap,
            keys,
            n_slots,
            page_capacity,
        })
    }

    /// Reopen an existing index.
    pub fn open(cache: &TileCache, ids: FieldIndexIds, page_capacity: u32) -> Result<Self> {
        let hmap = HmapPartition::open(cache, ids.hmap)?;
        let gmap = GmapPartition::open(cache, ids.gmap, page_capacity)?;
        let keys = FlatPartition::open(cache, ids.keys)?;
        let n_slots = hmap.n_slots();
        Ok(FieldIndex {
            hmap,
            gmap,
            keys,
            n_slots,
            page_capacity,
        })
    }

    fn slot_for(&self, value: Id) -> u64 {
        value.get().wrapping_mul(0x9E37_79B9_7F4A_7C15) % self.n_slots
    }

    fn stored_key(&self, cache: &TileCache, slot: u64) -> Result<Id> {
        let raw = self.keys.read(cache, slot * KEY_LEN, KEY_LEN)?;
        let mut buf = [0u8; 5];
        buf.copy_from_slice(&raw);
        Ok(decode_id5(buf))
    }

    fn append_chunked(
        &mut self,
        cache: &TileCache,
        ids: &[Id],
        horizon: u64,
        backup: &mut BackupLog,
    ) -> Result<u64> {
        let capacity = self.page_capacity as usize;
        let mut pages = Vec::new();
        for chunk in ids.chunks(capacity) {
            pages.push(self.gmap.append_page(cache, chunk, horizon, backup)?);
        }
        for window in pages.windows(2) {
            self.gmap.link(cache, window[0], window[1], horizon, backup)?;
        }
        Ok(pages[0])
    }

    /// Record that `target` matches `value`, probing past occupied slots
    /// whose stored key differs (an ordinary hash-collision chain, not the
    /// field's own GMAP overflow chain).
    pub fn insert(
        &mut self,
        cache: &TileCache,
        value: Id,
        target: Id,
        horizon: u64,
        backup: &mut BackupLog,
    ) -> Result<()> {
        let start = self.slot_for(value);
        for probe in 0..self.n_slots {
            let slot = (start + probe) % self.n_slots;
            let bucket = self.hmap.get(cache, slot)?;
            if bucket.key_len == 0 {
                self.keys.write(cache, slot * KEY_LEN, &encode_id5(value), horizon, backup)?;
                let bucket = Bucket {
                    key_offset: 0,
                    key_len: KEY_LEN as u16,
                    key_type: 0,
                    value: BucketValue::Inline(target),
                };
                self.hmap.put(cache, slot, &bucket, horizon, backup)?;
                return Ok(());
            }
            if self.stored_key(cache, slot)? != value {
                continue;
            }
            match bucket.value {
                BucketValue::Inline(existing) if existing == target => {}
                BucketValue::Inline(existing) => {
                    let mut ids = vec![existing, target];
                    ids.sort();
                    let page = self.append_chunked(cache, &ids, horizon, backup)?;
                    let bucket = Bucket {
                        value: BucketValue::GmapChain(page),
                        ..bucket
                    };
                    self.hmap.put(cache, slot, &bucket, horizon, backup)?;
                }
                BucketValue::GmapChain(head) => {
                    let mut ids = self.gmap.collect_chain(cache, head)?;
                    if !ids.contains(&target) {
                        ids.push(target);
                        ids.sort();
                        let page = self.append_chunked(cache, &ids, horizon, backup)?;
                        let bucket = Bucket {
                            value: BucketValue::GmapChain(page),
                            ..bucket
                        };
                        self.hmap.put(cache, slot, &bucket, horizon, backup)?;
                    }
                }
            }
            return Ok(());
        }
        Err(Error::Corrupt("field index: hash table full".into()))
    }

    /// Every id matching `value`, sorted in `direction`; `None` if `value`
    /// has no matches.
    pub fn lookup(&self, cache: &TileCache, value: Id, direction: Direction) -> Result<Option<IdArray>> {
        let start = self.slot_for(value);
        for probe in 0..self.n_slots {
            let slot = (start + probe) % self.n_slots;
            let bucket = self.hmap.get(cache, slot)?;
            if bucket.key_len == 0 {
                return Ok(None);
            }
            if self.stored_key(cache, slot)? != value {
                continue;
            }
            return Ok(Some(match bucket.value {
                BucketValue::Inline(id) => IdArray::bucket(vec![id], direction)?,
                BucketValue::GmapChain(head) => IdArray::gmap_chain(cache, &self.gmap, head, direction)?,
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravel_storage::TileCache;

    fn setup() -> (tempfile::TempDir, TileCache, FieldIndexIds) {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(512, 64);
        let ids = FieldIndexIds {
            hmap: PartitionId(1),
            gmap: PartitionId(2),
            keys: PartitionId(3),
        };
        cache.open_partition(ids.hmap, dir.path().join("h")).unwrap();
        cache.open_partition(ids.gmap, dir.path().join("g")).unwrap();
        cache.open_partition(ids.keys, dir.path().join("k")).unwrap();
        (dir, cache, ids)
    }

    #[test]
    fn single_match_round_trips_as_inline() {
        let (_dir, cache, ids) = setup();
        let mut log = BackupLog::create(_dir.path().join("b"), 0).unwrap();
        let mut idx = FieldIndex::create(&cache, ids, 16, 4, &mut log).unwrap();

        idx.insert(&cache, Id::new(7).unwrap(), Id::new(100).unwrap(), 1, &mut log).unwrap();
        let found = idx.lookup(&cache, Id::new(7).unwrap(), Direction::Forward).unwrap().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.read1(0).unwrap(), Id::new(100).unwrap());
    }

    #[test]
    fn multiple_matches_promote_to_a_gmap_chain() {
        let (_dir, cache, ids) = setup();
        let mut log = BackupLog::create(_dir.path().join("b"), 0).unwrap();
        let mut idx = FieldIndex::create(&cache, ids, 16, 4, &mut log).unwrap();

        let value = Id::new(7).unwrap();
        for target in [30, 10, 20] {
            idx.insert(&cache, value, Id::new(target).unwrap(), 1, &mut log).unwrap();
        }
        let found = idx.lookup(&cache, value, Direction::Forward).unwrap().unwrap();
        let mut buf = Vec::new();
        let n = found.read(0, 10, &mut buf);
        assert_eq!(n, 3);
        assert_eq!(buf, vec![Id::new(10).unwrap(), Id::new(20).unwrap(), Id::new(30).unwrap()]);
    }

    #[test]
    fn unmatched_value_reports_none() {
        let (_dir, cache, ids) = setup();
        let mut log = BackupLog::create(_dir.path().join("b"), 0).unwrap();
        let idx = FieldIndex::create(&cache, ids, 16, 4, &mut log).unwrap();
        assert!(idx.lookup(&cache, Id::new(5).unwrap(), Direction::Forward).unwrap().is_none());
    }
}
