//! Flat partition: magic header then an undifferentiated byte stream
//! (spec.md §6 "Flat").

use crate::error::{Result, StorageError};
use crate::tile::{AccessMode, PartitionId, TileCache};
use gravel_durability::BackupLog;

const MAGIC: &[u8; 4] = b"afl2";
const HEADER_LEN: u64 = 4;

/// A flat partition: everything past the magic is the caller's raw
/// payload, addressed as logical byte offset `0` starting right after the
/// header.
pub struct FlatPartition {
    id: PartitionId,
}

impl FlatPartition {
    /// Initialize a fresh flat partition by writing its magic header.
    pub fn create(cache: &TileCache, id: PartitionId, backup: &mut BackupLog) -> Result<Self> {
        let (_data, handle) = cache.alloc(id, 0, HEADER_LEN)?;
        cache.write(&handle, 0, MAGIC, 0, backup)?;
        cache.free(handle);
        Ok(FlatPartition { id })
    }

    /// Open an existing flat partition, validating its magic.
    pub fn open(cache: &TileCache, id: PartitionId) -> Result<Self> {
        let (data, handle) = cache.get(id, 0, HEADER_LEN, AccessMode::ReadOnly, 0, None)?;
        cache.free(handle);
        if &data[..] != MAGIC {
            return Err(StorageError::Corrupt("flat partition: bad magic".into()));
        }
        Ok(FlatPartition { id })
    }

    /// Read `len` raw bytes starting at logical offset `offset` (offset
    /// `0` is the first byte after the header).
    pub fn read(&self, cache: &TileCache, offset: u64, len: u64) -> Result<Vec<u8>> {
        let (data, handle) = cache.get(
            self.id,
            HEADER_LEN + offset,
            HEADER_LEN + offset + len,
            AccessMode::ReadOnly,
            0,
            None,
        )?;
        cache.free(handle);
        Ok(data)
    }

    /// Write `bytes` at logical offset `offset`, extending the partition
    /// if necessary.
    pub fn write(
        &self,
        cache: &TileCache,
        offset: u64,
        bytes: &[u8],
        horizon_epoch: u64,
        backup: &mut BackupLog,
    ) -> Result<()> {
        let lo = HEADER_LEN + offset;
        let hi = lo + bytes.len() as u64;
        let (_data, handle) = cache.alloc(self.id, lo, hi)?;
        cache.write(&handle, lo, bytes, horizon_epoch, backup)?;
        cache.free(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_open_validates_magic() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(64, 8);
        let id = PartitionId(1);
        cache.open_partition(id, dir.path().join("flat.dat")).unwrap();
        let mut log = BackupLog::create(dir.path().join("b.log"), 0).unwrap();
        FlatPartition::create(&cache, id, &mut log).unwrap();
        FlatPartition::open(&cache, id).unwrap();
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(64, 8);
        let id = PartitionId(1);
        cache.open_partition(id, dir.path().join("flat.dat")).unwrap();
        let mut log = BackupLog::create(dir.path().join("b.log"), 0).unwrap();
        let part = FlatPartition::create(&cache, id, &mut log).unwrap();
        part.write(&cache, 0, b"payload", 1, &mut log).unwrap();
        let back = part.read(&cache, 0, 7).unwrap();
        assert_eq!(&back, b"payload");
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(64, 8);
        let id = PartitionId(1);
        cache.open_partition(id, dir.path().join("flat.dat")).unwrap();
        let (_d, handle) = cache.alloc(id, 0, 4).unwrap();
        let mut log = BackupLog::create(dir.path().join("b.log"), 0).unwrap();
        cache.write(&handle, 0, b"XXXX", 0, &mut log).unwrap();
        cache.free(handle);
        assert!(FlatPartition::open(&cache, id).is_err());
    }
}
