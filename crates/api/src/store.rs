//! Primitive bodies: an istore partition holding encoded
//! [`Primitive`] records, plus the next-id watermark that allocates their
//! ids (spec.md §6 "Istore partition", §3 "Primitive").
//!
//! Record layout, logical offset `0` of each slot:
//!
//! ```text
//! left_present u8 | left id5 (5) | right_present u8 | right id5 (5)
//! | typeguid_present u8 | typeguid id5 (5) | payload_len u32 BE (4)
//! | payload[payload_len] (JSON bytes)
//! ```
//!
//! Istore slots carry no length of their own, so every read happens in two
//! passes: the fixed-size header first (to learn `payload_len`), then the
//! full record once the total length is known.

use gravel_core::id::{decode_id5, encode_id5, Id};
use gravel_core::primitive::{Primitive, Value};
use gravel_core::{Error, Result};
use gravel_durability::BackupLog;
use gravel_storage::partition::istore::{IstoreMarker, MarkerKind};
use gravel_storage::{IstorePartition, PartitionId, TileCache};

const HEADER_LEN: u64 = 1 + 5 + 1 + 5 + 1 + 5 + 4;

fn encode_optional(id: Option<Id>) -> (u8, [u8; 5]) {
    match id {
        Some(id) => (1, encode_id5(id)),
        None => (0, [0; 5]),
    }
}

fn decode_optional(present: u8, bytes: [u8; 5]) -> Option<Id> {
    (present != 0).then(|| decode_id5(bytes))
}

fn encode_record(primitive: &Primitive) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(&primitive.payload.0)
        .map_err(|e| Error::Corrupt(format!("primitive payload not encodable: {e}")))?;
    let mut buf = Vec::with_capacity(HEADER_LEN as usize + payload.len());
    let (p, b) = encode_optional(primitive.left);
    buf.push(p);
    buf.extend_from_slice(&b);
    let (p, b) = encode_optional(primitive.right);
    buf.push(p);
    buf.extend_from_slice(&b);
    let (p, b) = encode_optional(primitive.typeguid);
    buf.push(p);
    buf.extend_from_slice(&b);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

fn decode_record(id: Id, bytes: &[u8]) -> Result<Primitive> {
    if (bytes.len() as u64) < HEADER_LEN {
        return Err(Error::Corrupt("primitive record shorter than its header".into()));
    }
    let mut left_bytes = [0u8; 5];
    left_bytes.copy_from_slice(&bytes[1..6]);
    let left = decode_optional(bytes[0], left_bytes);
    let mut right_bytes = [0u8; 5];
    right_bytes.copy_from_slice(&bytes[7..12]);
    let right = decode_optional(bytes[6], right_bytes);
    let mut typeguid_bytes = [0u8; 5];
    typeguid_bytes.copy_from_slice(&bytes[13..18]);
    let typeguid = decode_optional(bytes[12], typeguid_bytes);
    let payload_len = u32::from_be_bytes(bytes[18..22].try_into().unwrap()) as usize;
    let payload_bytes = &bytes[22..22 + payload_len];
    let payload = serde_json::from_slice(payload_bytes)
        .map_err(|e| Error::Corrupt(format!("primitive payload not valid json: {e}")))?;
    Ok(Primitive {
        id,
        left,
        right,
        typeguid,
        payload: Value(payload),
    })
}

/// Owns primitive storage: the istore partition holding record bodies and
/// the watermark marking the next id to allocate.
pub struct PrimitiveStore {
    istore: IstorePartition,
    marker_partition: PartitionId,
    next_id: Id,
}

impl PrimitiveStore {
    /// Initialize a fresh, empty store.
    pub fn create(
        cache: &TileCache,
        istore_id: PartitionId,
        marker_partition: PartitionId,
        backup: &mut BackupLog,
    ) -> Result<Self> {
        let istore = IstorePartition::create(cache, istore_id, backup)?;
        let marker = IstoreMarker {
            kind: MarkerKind::NextId,
            horizon: 0,
            next_id: Id::MIN,
            horizon_low40: 0,
        };
        marker.write(cache, marker_partition, 0, backup)?;
        Ok(PrimitiveStore {
            istore,
            marker_partition,
            next_id: Id::MIN,
        })
    }

    /// Reopen an existing store, restoring the next-id watermark.
    pub fn open(cache: &TileCache, istore_id: PartitionId, marker_partition: PartitionId) -> Result<Self> {
        let istore = IstorePartition::open(cache, istore_id)?;
        let marker = IstoreMarker::read(cache, marker_partition, MarkerKind::NextId)?;
        Ok(PrimitiveStore {
            istore,
            marker_partition,
            next_id: marker.next_id,
        })
    }

    /// Allocate the next id, append the encoded primitive, and persist the
    /// advanced watermark.
    pub fn insert(
        &mut self,
        cache: &TileCache,
        left: Option<Id>,
        right: Option<Id>,
        typeguid: Option<Id>,
        payload: Value,
        horizon: u64,
        backup: &mut BackupLog,
    ) -> Result<Primitive> {
        let id = self.next_id;
        let primitive = Primitive {
            id,
            left,
            right,
            typeguid,
            payload,
        };
        let record = encode_record(&primitive)?;
        self.istore.append(cache, &record, horizon, backup)?;

        let advanced = id.next().ok_or_else(|| Error::Corrupt("primitive id space exhausted".into()))?;
        self.next_id = advanced;
        let marker = IstoreMarker {
            kind: MarkerKind::NextId,
            horizon,
            next_id: advanced,
            horizon_low40: horizon,
        };
        marker.write(cache, self.marker_partition, horizon, backup)?;
        Ok(primitive)
    }

    /// Read back the primitive stored at `id`. Relies on primitives having
    /// been inserted in increasing id order starting at `Id::MIN`, so an
    /// id's istore slot is simply `id - Id::MIN`.
    pub fn get(&self, cache: &TileCache, id: Id) -> Result<Primitive> {
        let slot = id.get().saturating_sub(Id::MIN.get());
        if slot >= self.istore.next_slot() as u64 {
            return Err(Error::NotFound);
        }
        let header = self.istore.read(cache, slot as u32, HEADER_LEN)?;
        let payload_len = u32::from_be_bytes(header[18..22].try_into().unwrap()) as u64;
        let total = self.istore.read(cache, slot as u32, HEADER_LEN + payload_len)?;
        decode_record(id, &total)
    }

    /// How many primitives have been inserted.
    pub fn len(&self) -> u64 {
        self.next_id.get() - Id::MIN.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(4096, 64);
        let istore_id = PartitionId(1);
        let marker_id = PartitionId(2);
        cache.open_partition(istore_id, dir.path().join("p")).unwrap();
        cache.open_partition(marker_id, dir.path().join("m")).unwrap();
        let mut log = BackupLog::create(dir.path().join("b"), 0).unwrap();

        let mut store = PrimitiveStore::create(&cache, istore_id, marker_id, &mut log).unwrap();
        let payload = Value(serde_json::json!({"name": "alice"}));
        let p = store
            .insert(&cache, Some(Id::new(2).unwrap()), None, Some(Id::new(3).unwrap()), payload.clone(), 1, &mut log)
            .unwrap();
        assert_eq!(p.id, Id::MIN);

        let back = store.get(&cache, Id::MIN).unwrap();
        assert_eq!(back.left, Some(Id::new(2).unwrap()));
        assert_eq!(back.right, None);
        assert_eq!(back.typeguid, Some(Id::new(3).unwrap()));
        assert_eq!(back.payload, payload);
    }

    #[test]
    fn unknown_id_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(4096, 64);
        let istore_id = PartitionId(1);
        let marker_id = PartitionId(2);
        cache.open_partition(istore_id, dir.path().join("p")).unwrap();
        cache.open_partition(marker_id, dir.path().join("m")).unwrap();
        let mut log = BackupLog::create(dir.path().join("b"), 0).unwrap();
        let store = PrimitiveStore::create(&cache, istore_id, marker_id, &mut log).unwrap();
        assert!(matches!(store.get(&cache, Id::new(99).unwrap()), Err(Error::NotFound)));
    }

    #[test]
    fn reopen_resumes_id_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::new(4096, 64);
        let istore_id = PartitionId(1);
        let marker_id = PartitionId(2);
        cache.open_partition(istore_id, dir.path().join("p")).unwrap();
        cache.open_partition(marker_id, dir.path().join("m")).unwrap();
        let mut log = BackupLog::create(dir.path().join("b"), 0).unwrap();
        {
            let mut store = PrimitiveStore::create(&cache, istore_id, marker_id, &mut log).unwrap();
            store.insert(&cache, None, None, None, Value(serde_json::Value::Null), 1, &mut log).unwrap();
        }
        let reopened = PrimitiveStore::open(&cache, istore_id, marker_id).unwrap();
        assert_eq!(reopened.len(), 1);
    }
}
