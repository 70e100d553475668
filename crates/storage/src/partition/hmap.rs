//! HMAP partition: open-addressed key/value index with a fixed header and
//! variable-size bucket pages (spec.md §6 "HMAP header", "HMAP bucket").
//!
//! ```text
//! Header: magic "ah2p" (4) | next_entry id5 (5) | bucket_page_size u32 BE (4)
//!       | n_slots u64 BE (8) | last_bucket_page_offset u32 BE (4)
//!       padded to one page.
//! Bucket: key_offset u16 BE | key_len u16 BE | type u8 | value id5 (5)
//! ```
//!
//! A bucket's `value` field packs two cases into 5 bytes the way spec.md
//! describes for GMAP-chain lookups: when the top bit of the first byte is
//! clear, the remaining 39 bits are a GMAP chain index; when it is set,
//! the rest holds an inlined singleton id directly, skipping the chain
//! for keys with exactly one match.

use crate::error::{Result, StorageError};
use crate::tile::{AccessMode, PartitionId, TileCache};
use byteorder::{BigEndian, ByteOrder};
use gravel_core::id::Id;
use gravel_durability::BackupLog;

const MAGIC: &[u8; 4] = b"ah2p";
const HEADER_LOGICAL_LEN: u64 = 4 + 5 + 4 + 8 + 4;

/// Decoded HMAP bucket value: either a chain into the GMAP index for this
/// key, or a directly inlined singleton id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketValue {
    /// Index of the first page in this key's GMAP chain.
    GmapChain(u64),
    /// The single id matching this key, stored without a chain.
    Inline(Id),
}

impl BucketValue {
    fn encode(self) -> [u8; 5] {
        match self {
            BucketValue::GmapChain(idx) => {
                debug_assert!(idx < (1u64 << 39));
                let mut buf = [0u8; 8];
                BigEndian::write_u64(&mut buf, idx);
                [buf[3] & 0x7F, buf[4], buf[5], buf[6], buf[7]]
            }
            BucketValue::Inline(id) => {
                let raw = gravel_core::id::encode_id5(id);
                [raw[0] | 0x80, raw[1], raw[2], raw[3], raw[4]]
            }
        }
    }

    fn decode(bytes: [u8; 5]) -> Self {
        if bytes[0] & 0x80 != 0 {
            let mut raw = bytes;
            raw[0] &= 0x7F;
            BucketValue::Inline(gravel_core::id::decode_id5(raw))
        } else {
            let full = [0, 0, 0, bytes[0] & 0x7F, bytes[1], bytes[2], bytes[3], bytes[4]];
            BucketValue::GmapChain(BigEndian::read_u64(&full))
        }
    }
}

/// One decoded bucket entry: the key it covers (as raw bytes read
/// separately from the key region) and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// Offset of the key's bytes within the partition's key region.
    pub key_offset: u16,
    /// Length of the key in bytes.
    pub key_len: u16,
    /// Application-defined key type tag.
    pub key_type: u8,
    /// The looked-up value.
    pub value: BucketValue,
}

const BUCKET_LEN: u64 = 2 + 2 + 1 + 5;

/// An HMAP partition: fixed header plus a flat array of fixed-size bucket
/// slots, open-addressed by the caller's hash function.
pub struct HmapPartition {
    id: PartitionId,
    page_size: u32,
    n_slots: u64,
}

impl HmapPartition {
    /// Initialize a fresh HMAP partition with `n_slots` buckets, all
    /// empty (`key_len == 0`).
    pub fn create(
        cache: &TileCache,
        id: PartitionId,
        page_size: u32,
        n_slots: u64,
        backup: &mut BackupLog,
    ) -> Result<Self> {
        let header_region = page_size as u64;
        let total = header_region + n_slots * BUCKET_LEN;
        let (_d, handle) = cache.alloc(id, 0, total)?;

        let mut header = Vec::with_capacity(HEADER_LOGICAL_LEN as usize);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&gravel_core::id::encode_id5(Id::MIN));
        let mut page_size_be = [0u8; 4];
        BigEndian::write_u32(&mut page_size_be, page_size);
        header.extend_from_slice(&page_size_be);
        let mut n_slots_be = [0u8; 8];
        BigEndian::write_u64(&mut n_slots_be, n_slots);
        header.extend_from_slice(&n_slots_be);
        let mut last_page_be = [0u8; 4];
        BigEndian::write_u32(&mut last_page_be, 0);
        header.extend_from_slice(&last_page_be);

        cache.write(&handle, 0, &header, 0, backup)?;
        cache.free(handle);
        Ok(HmapPartition {
            id,
            page_size,
            n_slots,
        })
    }

    /// Open an existing HMAP partition, reading its header.
    pub fn open(cache: &TileCache, id: PartitionId) -> Result<Self> {
        let (data, handle) =
            cache.get(id, 0, HEADER_LOGICAL_LEN, AccessMode::ReadOnly, 0, None)?;
        cache.free(handle);
        if &data[0..4] != MAGIC {
            return Err(StorageError::Corrupt("hmap partition: bad magic".into()));
        }
        let page_size = BigEndian::read_u32(&data[9..13]);
        let n_slots = BigEndian::read_u64(&data[13..21]);
        Ok(HmapPartition {
            id,
            page_size,
            n_slots,
        })
    }

    /// Total bucket slot count.
    pub fn n_slots(&self) -> u64 {
        self.n_slots
    }

    fn slot_offset(&self, slot: u64) -> u64 {
        self.page_size as u64 + slot * BUCKET_LEN
    }

    /// Write the bucket at `slot`.
    pub fn put(
        &self,
        cache: &TileCache,
        slot: u64,
        bucket: &Bucket,
        horizon_epoch: u64,
        backup: &mut BackupLog,
    ) -> Result<()> {
        if slot >= self.n_slots {
            return Err(StorageError::Corrupt("hmap partition: slot out of range".into()));
        }
        let mut buf = Vec::with_capacity(BUCKET_LEN as usize);
        let mut key_off_be = [0u8; 2];
        BigEndian::write_u16(&mut key_off_be, bucket.key_offset);
        buf.extend_from_slice(&key_off_be);
        let mut key_len_be = [0u8; 2];
        BigEndian::write_u16(&mut key_len_be, bucket.key_len);
        buf.extend_from_slice(&key_len_be);
        buf.push(bucket.key_type);
        buf.extend_from_slice(&bucket.value.encode());

        let off = self.slot_offset(slot);
        let (_d, handle) =
            cache.get(self.id, off, off + BUCKET_LEN, AccessMode::ReadWrite, horizon_epoch, Some(backup))?;
        cache.write(&handle, off, &buf, horizon_epoch, backup)?;
        cache.free(handle);
        Ok(())
    }

    /// Read the bucket at `slot`. A bucket with `key_len == 0` is empty.
    pub fn get(&self, cache: &TileCache, slot: u64) -> Result<Bucket> {
        if slot >= self.n_slots {
            return Err(StorageError::Corrupt("hmap partition: slot out of range".into()));
        }
        let off = self.slot_offset(slot);
        let (data, handle) = cache.get(self.id, off, off + BUCKET_LEN, AccessMode::ReadOnly, 0, None)?;
        cache.free(handle);
        let key_offset = BigEndian::read_u16(&data[0..2]);
        let key_len = BigEndian::read_u16(&data[2..4]);
        let key_type = data[4];
        let mut value_bytes = [0u8; 5];
        value_bytes.copy_from_slice(&data[5..10]);
        Ok(Bucket {
            key_offset,
            key_len,
            key_type,
            value: BucketValue::decode(value_bytes),
        })
    }
}
