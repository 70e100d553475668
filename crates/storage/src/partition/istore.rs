//! Istore partition: a slotted, append-mostly store addressed through a
//! fixed offset index (spec.md §6 "Istore partition", "Istore markers").
//!
//! ```text
//! Partition: magic "ai3p" (4) | next_slot u32 BE | offset_index[16M] u32 BE | data
//! Marker:    magic "ai1n"/"ai1h" (4) | horizon u64 BE | next_id id5 | horizon id5
//! ```
//!
//! Offset index entries are biased: `0` means "unused slot", and a
//! non-zero entry `stored` decodes to a byte offset via
//! `data_base - 8 + 8 * stored` (spec.md §6) — i.e. offsets are stored
//! scaled down by 8 (every record is at least 8-byte aligned) with a +1
//! bias so the all-zero sentinel never collides with a real offset.

use crate::error::{Result, StorageError};
use crate::tile::{AccessMode, PartitionId, TileCache};
use byteorder::{BigEndian, ByteOrder};
use gravel_core::id::{decode_id5, encode_id5, Id};
use gravel_durability::BackupLog;

const MAGIC: &[u8; 4] = b"ai3p";
const SLOT_COUNT: u64 = 16 * 1024 * 1024;
const NEXT_SLOT_LEN: u64 = 4;
const INDEX_LEN: u64 = SLOT_COUNT * 4;
const HEADER_LEN: u64 = 4 + NEXT_SLOT_LEN;
const DATA_BASE: u64 = HEADER_LEN + INDEX_LEN;

/// Which marker magic this file uses. Spec.md names two — `ai1n` for the
/// next-id watermark file and `ai1h` for the horizon watermark file — both
/// sharing one physical layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// `"ai1n"`.
    NextId,
    /// `"ai1h"`.
    Horizon,
}

impl MarkerKind {
    fn magic(self) -> &'static [u8; 4] {
        match self {
            MarkerKind::NextId => b"ai1n",
            MarkerKind::Horizon => b"ai1h",
        }
    }
}

/// An istore watermark record: the durable horizon epoch paired with the
/// next id to be allocated and a secondary (narrower) horizon value used
/// by cursor encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IstoreMarker {
    /// Marker file variant.
    pub kind: MarkerKind,
    /// Full 64-bit horizon epoch.
    pub horizon: u64,
    /// Next id to be allocated from this partition.
    pub next_id: Id,
    /// Low 40 bits of the horizon, as stored inline for compact cursors.
    pub horizon_low40: u64,
}

impl IstoreMarker {
    const LEN: u64 = 4 + 8 + 5 + 5;

    /// Write a marker at logical offset 0 of a freshly allocated
    /// partition.
    pub fn write(
        &self,
        cache: &TileCache,
        id: PartitionId,
        horizon_epoch: u64,
        backup: &mut BackupLog,
    ) -> Result<()> {
        let mut buf = Vec::with_capacity(Self::LEN as usize);
        buf.extend_from_slice(self.kind.magic());
        let mut horizon_be = [0u8; 8];
        BigEndian::write_u64(&mut horizon_be, self.horizon);
        buf.extend_from_slice(&horizon_be);
        buf.extend_from_slice(&encode_id5(self.next_id));
        let mut low40 = [0u8; 8];
        BigEndian::write_u64(&mut low40, self.horizon_low40);
        buf.extend_from_slice(&low40[3..8]);

        let (_d, handle) = cache.alloc(id, 0, Self::LEN)?;
        cache.write(&handle, 0, &buf, horizon_epoch, backup)?;
        cache.free(handle);
        Ok(())
    }

    /// Read and validate a marker file.
    pub fn read(cache: &TileCache, id: PartitionId, kind: MarkerKind) -> Result<Self> {
        let (data, handle) = cache.get(id, 0, Self::LEN, AccessMode::ReadOnly, 0, None)?;
        cache.free(handle);
        if &data[0..4] != kind.magic() {
            return Err(StorageError::Corrupt("istore marker: bad magic".into()));
        }
        let horizon = BigEndian::read_u64(&data[4..12]);
        let mut id_bytes = [0u8; 5];
        id_bytes.copy_from_slice(&data[12..17]);
        let next_id = decode_id5(id_bytes);
        let mut low40_be = [0u8; 8];
        low40_be[3..8].copy_from_slice(&data[17..22]);
        let horizon_low40 = BigEndian::read_u64(&low40_be);
        Ok(IstoreMarker {
            kind,
            horizon,
            next_id,
            horizon_low40,
        })
    }
}

/// A slotted istore partition: fixed-size offset index mapping slot
/// numbers to variable-length records in the data region.
pub struct IstorePartition {
    id: PartitionId,
    next_slot: u32,
    data_len: u64,
}

impl IstorePartition {
    /// Initialize a fresh istore partition: header, zeroed index, empty
    /// data region.
    pub fn create(cache: &TileCache, id: PartitionId, backup: &mut BackupLog) -> Result<Self> {
        let (_d, handle) = cache.alloc(id, 0, DATA_BASE)?;
        let mut header = Vec::with_capacity(HEADER_LEN as usize);
        header.extend_from_slice(MAGIC);
        let mut next_slot_be = [0u8; 4];
        BigEndian::write_u32(&mut next_slot_be, 0);
        header.extend_from_slice(&next_slot_be);
        cache.write(&handle, 0, &header, 0, backup)?;
        cache.free(handle);
        Ok(IstorePartition {
            id,
            next_slot: 0,
            data_len: 0,
        })
    }

    /// Open an existing istore partition, reading its header.
    pub fn open(cache: &TileCache, id: PartitionId) -> Result<Self> {
        let (data, handle) =
            cache.get(id, 0, HEADER_LEN, AccessMode::ReadOnly, 0, None)?;
        cache.free(handle);
        if &data[0..4] != MAGIC {
            return Err(StorageError::Corrupt("istore partition: bad magic".into()));
        }
        let next_slot = BigEndian::read_u32(&data[4..8]);
        cache.stretch(id)?;
        let total_len = cache.partition_len(id)?;
        let data_len = total_len.saturating_sub(DATA_BASE);
        Ok(IstorePartition {
            id,
            next_slot,
            data_len,
        })
    }

    /// Number of slots ever allocated.
    pub fn next_slot(&self) -> u32 {
        self.next_slot
    }

    fn index_offset(slot: u32) -> u64 {
        HEADER_LEN + slot as u64 * 4
    }

    fn decode_offset(stored: u32) -> Option<u64> {
        if stored == 0 {
            None
        } else {
            Some(DATA_BASE - 8 + 8 * stored as u64)
        }
    }

    fn encode_offset(byte_offset: u64) -> u32 {
        (((byte_offset + 8 - DATA_BASE) / 8) as u32).max(1)
    }

    /// Append `record` to the data region and bind it to a newly
    /// allocated slot, returning that slot number.
    pub fn append(
        &mut self,
        cache: &TileCache,
        record: &[u8],
        horizon_epoch: u64,
        backup: &mut BackupLog,
    ) -> Result<u32> {
        if (self.next_slot as u64) >= SLOT_COUNT {
            return Err(StorageError::Corrupt("istore partition: slots exhausted".into()));
        }
        let slot = self.next_slot;
        let padded_len = (record.len() + 7) / 8 * 8;
        let data_lo = DATA_BASE + self.data_len;
        let (_d, handle) = cache.alloc(self.id, data_lo, data_lo + padded_len as u64)?;
        cache.write(&handle, data_lo, record, horizon_epoch, backup)?;
        cache.free(handle);

        let stored = Self::encode_offset(data_lo);
        let mut stored_be = [0u8; 4];
        BigEndian::write_u32(&mut stored_be, stored);
        let idx_off = Self::index_offset(slot);
        let (_d, handle) = cache.get(
            self.id,
            idx_off,
            idx_off + 4,
            AccessMode::ReadWrite,
            horizon_epoch,
            Some(backup),
        )?;
        cache.write(&handle, idx_off, &stored_be, horizon_epoch, backup)?;
        cache.free(handle);
        self.data_len += padded_len as u64;

        self.next_slot += 1;
        let mut header = Vec::with_capacity(4);
        let mut next_slot_be = [0u8; 4];
        BigEndian::write_u32(&mut next_slot_be, self.next_slot);
        header.extend_from_slice(&next_slot_be);
        let (_d, handle) = cache.get(self.id, 4, 8, AccessMode::ReadWrite, horizon_epoch, Some(backup))?;
        cache.write(&handle, 4, &header, horizon_epoch, backup)?;
        cache.free(handle);

        Ok(slot)
    }

    /// Read the record bound to `slot`, given its exact length.
    pub fn read(&self, cache: &TileCache, slot: u32, len: u64) -> Result<Vec<u8>> {
        let idx_off = Self::index_offset(slot);
        let (idx, handle) = cache.get(self.id, idx_off, idx_off + 4, AccessMode::ReadOnly, 0, None)?;
        cache.free(handle);
        let stored = BigEndian::read_u32(&idx);
        let byte_offset = Self::decode_offset(stored)
            .ok_or_else(|| StorageError::Corrupt(format!("istore partition: empty slot {slot}")))?;
        let (data, handle) = cache.get(
            self.id,
            byte_offset,
            byte_offset + len,
            AccessMode::ReadOnly,
            0,
            None,
        )?;
        cache.free(handle);
        Ok(data)
    }
}
