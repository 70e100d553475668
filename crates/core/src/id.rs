//! Primitive identifiers.
//!
//! Primitives are addressed by a stable 34-bit local id (spec.md §3,
//! "Primitive"). 34 bits comfortably outlives a 32-bit counter while still
//! packing into the 5-byte wire encoding used throughout the on-disk
//! formats (spec.md §6).

use std::fmt;

/// Largest value representable in 34 bits.
pub const MAX_ID: u64 = (1u64 << 34) - 1;

/// A primitive identifier.
///
/// `Id` is a thin newtype over `u64` rather than a raw integer so that
/// call sites cannot accidentally mix ids with byte offsets or budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Id(u64);

/// An id value did not fit in 34 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("id {0} exceeds the 34-bit id space")]
pub struct IdOutOfRange(pub u64);

impl Id {
    /// The smallest valid id. Id `0` is reserved (unused, mirrors the
    /// "0 is invalid" bias used for istore offsets in spec.md §6).
    pub const MIN: Id = Id(1);

    /// The largest valid id.
    pub const MAX: Id = Id(MAX_ID);

    /// Construct an `Id`, checking the 34-bit bound.
    pub fn new(raw: u64) -> Result<Self, IdOutOfRange> {
        if raw == 0 || raw > MAX_ID {
            Err(IdOutOfRange(raw))
        } else {
            Ok(Id(raw))
        }
    }

    /// Construct an `Id` without checking the bound. Used on paths that
    /// have already validated the value (e.g. decoded from a 5-byte
    /// on-disk field that is itself bounded).
    pub fn new_unchecked(raw: u64) -> Self {
        debug_assert!(raw <= MAX_ID);
        Id(raw)
    }

    /// The raw integer value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Next id in ascending order; `None` at `Id::MAX`.
    pub fn next(self) -> Option<Id> {
        (self.0 < MAX_ID).then(|| Id(self.0 + 1))
    }

    /// Previous id in ascending order; `None` at `Id::MIN`.
    pub fn prev(self) -> Option<Id> {
        (self.0 > 1).then(|| Id(self.0 - 1))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Id> for u64 {
    fn from(id: Id) -> u64 {
        id.0
    }
}

/// A half-open id range `[low, high)`, as produced by `create(low, high, ..)`
/// (spec.md §4.5.1) and consumed by every leaf iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    /// Inclusive lower bound.
    pub low: Id,
    /// Exclusive upper bound.
    pub high: Id,
}

impl IdRange {
    /// The full id space.
    pub fn full() -> Self {
        IdRange {
            low: Id::MIN,
            high: Id(MAX_ID).next().unwrap_or(Id(MAX_ID)),
        }
    }

    /// `true` if `low >= high`, i.e. the range is empty (spec.md §4.5.1
    /// "NULL propagation").
    pub fn is_empty(self) -> bool {
        self.low >= self.high
    }

    /// `true` if `id` falls within `[low, high)`.
    pub fn contains(self, id: Id) -> bool {
        id >= self.low && id < self.high
    }

    /// Intersection of two ranges (used by range tightening, spec.md
    /// §4.5.1 step 1).
    pub fn intersect(self, other: IdRange) -> IdRange {
        IdRange {
            low: self.low.max(other.low),
            high: self.high.min(other.high),
        }
    }
}

/// Encode an id as a 5-byte big-endian field, the packed width used by
/// every on-disk id array and the istore markers (spec.md §6).
pub fn encode_id5(id: Id) -> [u8; 5] {
    let raw = id.get().to_be_bytes();
    [raw[3], raw[4], raw[5], raw[6], raw[7]]
}

/// Decode a 5-byte big-endian field written by [`encode_id5`].
pub fn decode_id5(bytes: [u8; 5]) -> Id {
    let raw = [
        0, 0, 0, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4],
    ];
    Id::new_unchecked(u64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_overflow() {
        assert!(Id::new(0).is_err());
        assert!(Id::new(MAX_ID + 1).is_err());
        assert!(Id::new(MAX_ID).is_ok());
    }

    #[test]
    fn range_intersect_tightens() {
        let a = IdRange {
            low: Id::new(1).unwrap(),
            high: Id::new(100).unwrap(),
        };
        let b = IdRange {
            low: Id::new(50).unwrap(),
            high: Id::new(200).unwrap(),
        };
        let i = a.intersect(b);
        assert_eq!(i.low, Id::new(50).unwrap());
        assert_eq!(i.high, Id::new(100).unwrap());
    }

    #[test]
    fn empty_when_low_at_or_past_high() {
        let r = IdRange {
            low: Id::new(10).unwrap(),
            high: Id::new(10).unwrap(),
        };
        assert!(r.is_empty());
    }

    #[test]
    fn id5_roundtrip() {
        for raw in [1u64, 42, MAX_ID / 2, MAX_ID] {
            let id = Id::new(raw).unwrap();
            assert_eq!(decode_id5(encode_id5(id)), id);
        }
    }
}
