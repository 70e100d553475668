//! GMAP partition: a chain of sorted id pages (spec.md §4.2 "gmap chain").
//!
//! Spec.md pins down bit-exact layouts for flat, istore, and HMAP (§6) but
//! leaves GMAP's physical format unspecified beyond "tree/hash pages" —
//! this module's layout is therefore an interpolated design, not a
//! bit-exact contract: a singly linked chain of fixed-size pages, each
//! holding a sorted run of packed 5-byte ids plus a link to the next page.
//! Chains are what HMAP bucket values with `GmapChain` point into
//! (spec.md §6 "HMAP bucket").
//!
//! ```text
//! Page: magic "agm1" (4) | count u32 BE (4) | next_page u64 BE (8, 0 = none)
//!     | ids[page_capacity] id5, only the first `count` meaningful
//! ```

use crate::error::{Result, StorageError};
use crate::tile::{AccessMode, PartitionId, TileCache};
use byteorder::{BigEndian, ByteOrder};
use gravel_core::id::{decode_id5, encode_id5, Id};
use gravel_durability::BackupLog;

const MAGIC: &[u8; 4] = b"agm1";
const PAGE_HEADER_LEN: u64 = 4 + 4 + 8;
const ID_LEN: u64 = 5;

/// A GMAP partition storing sorted id chains in fixed-size pages.
pub struct GmapPartition {
    id: PartitionId,
    page_capacity: u32,
    page_len: u64,
    next_free_page: u64,
}

impl GmapPartition {
    /// Initialize a fresh GMAP partition. `page_capacity` is the number of
    /// ids each page can hold.
    pub fn create(cache: &TileCache, id: PartitionId, page_capacity: u32) -> Result<Self> {
        // No header region of our own: the partition starts empty and
        // pages are appended on demand, so there is nothing to write yet.
        let _ = cache.partition_len(id)?;
        Ok(GmapPartition {
            id,
            page_capacity,
            page_len: PAGE_HEADER_LEN + page_capacity as u64 * ID_LEN,
            next_free_page: 0,
        })
    }

    /// Re-derive chain bookkeeping (`next_free_page`) from the partition's
    /// current logical size after a restart.
    pub fn open(cache: &TileCache, id: PartitionId, page_capacity: u32) -> Result<Self> {
        cache.stretch(id)?;
        let page_len = PAGE_HEADER_LEN + page_capacity as u64 * ID_LEN;
        let total = cache.partition_len(id)?;
        let next_free_page = total / page_len;
        Ok(GmapPartition {
            id,
            page_capacity,
            page_len,
            next_free_page,
        })
    }

    fn page_offset(&self, page: u64) -> u64 {
        page * self.page_len
    }

    /// Append a new page holding `ids` (must be already sorted and no
    /// larger than `page_capacity`), optionally linking from `prev_page`.
    /// Returns the new page's index.
    pub fn append_page(
        &mut self,
        cache: &TileCache,
        ids: &[Id],
        horizon_epoch: u64,
        backup: &mut BackupLog,
    ) -> Result<u64> {
        if ids.len() as u32 > self.page_capacity {
            return Err(StorageError::Corrupt("gmap page: too many ids".into()));
        }
        let page = self.next_free_page;
        let lo = self.page_offset(page);
        let hi = lo + self.page_len;
        let (_d, handle) = cache.alloc(self.id, lo, hi)?;

        let mut buf = Vec::with_capacity(self.page_len as usize);
        buf.extend_from_slice(MAGIC);
        let mut count_be = [0u8; 4];
        BigEndian::write_u32(&mut count_be, ids.len() as u32);
        buf.extend_from_slice(&count_be);
        let mut next_be = [0u8; 8];
        BigEndian::write_u64(&mut next_be, 0);
        buf.extend_from_slice(&next_be);
        for id in ids {
            buf.extend_from_slice(&encode_id5(*id));
        }
        buf.resize(self.page_len as usize, 0);

        cache.write(&handle, lo, &buf, horizon_epoch, backup)?;
        cache.free(handle);
        self.next_free_page += 1;
        Ok(page)
    }

    /// Point `page`'s chain link at `next_page`.
    pub fn link(
        &self,
        cache: &TileCache,
        page: u64,
        next_page: u64,
        horizon_epoch: u64,
        backup: &mut BackupLog,
    ) -> Result<()> {
        let off = self.page_offset(page) + 8;
        let mut next_be = [0u8; 8];
        BigEndian::write_u64(&mut next_be, next_page + 1);
        let (_d, handle) =
            cache.get(self.id, off, off + 8, AccessMode::ReadWrite, horizon_epoch, Some(backup))?;
        cache.write(&handle, off, &next_be, horizon_epoch, backup)?;
        cache.free(handle);
        Ok(())
    }

    /// Read one page: its sorted ids and the next page in the chain, if
    /// any.
    pub fn read_page(&self, cache: &TileCache, page: u64) -> Result<(Vec<Id>, Option<u64>)> {
        let lo = self.page_offset(page);
        let (data, handle) =
            cache.get(self.id, lo, lo + self.page_len, AccessMode::ReadOnly, 0, None)?;
        cache.free(handle);
        if &data[0..4] != MAGIC {
            return Err(StorageError::Corrupt("gmap page: bad magic".into()));
        }
        let count = BigEndian::read_u32(&data[4..8]) as usize;
        let raw_next = BigEndian::read_u64(&data[8..16]);
        let next_page = if raw_next == 0 { None } else { Some(raw_next - 1) };
        let mut ids = Vec::with_capacity(count);
        let mut off = PAGE_HEADER_LEN as usize;
        for _ in 0..count {
            let mut b = [0u8; 5];
            b.copy_from_slice(&data[off..off + 5]);
            ids.push(decode_id5(b));
            off += 5;
        }
        Ok((ids, next_page))
    }

    /// Walk the whole chain starting at `head`, collecting every id in
    /// order.
    pub fn collect_chain(&self, cache: &TileCache, head: u64) -> Result<Vec<Id>> {
        let mut out = Vec::new();
        let mut current = Some(head);
        while let Some(page) = current {
            let (ids, next) = self.read_page(cache, page)?;
            out.extend(ids);
            current = next;
        }
        Ok(out)
    }
}
