//! The ID-array accessor: a uniform read-only view over the four physical
//! id-sequence representations spec.md §4.2 describes — singleton,
//! bucket, GMAP chain, and bitmap.
//!
//! Every representation here materializes eagerly into a flat, direction-
//! ordered `Vec<Id>` at construction. The GMAP-chain variant is the only
//! one with a real reason to prefer lazy, page-at-a-time walking (it is
//! backed by disk, and a chain can be long); but `search`'s binary-search
//! contract needs random access across the whole sequence, and
//! `gravel_storage::GmapPartition` only exposes sequential chain
//! traversal, not addressable pages. Materializing once at construction
//! keeps `search` and `idarray_intersect` simple and correct; a
//! streaming accessor that binary-searches chain pages directly would be
//! a reasonable follow-up if chain length ever dominates memory, which
//! spec.md does not call out as a constraint.

use crate::error::{PrimitivesError, Result};
use gravel_core::direction::Direction;
use gravel_core::id::Id;
use gravel_storage::{GmapPartition, TileCache};

/// Which physical shape an [`IdArray`] was built from. Purely
/// informational — every variant answers the same operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// A single id inlined directly in a header field.
    Singleton,
    /// A short sorted array stored in a bucket page.
    Bucket,
    /// A chain of GMAP pages.
    GmapChain,
    /// A dense bitmap (HMAP types only).
    Bitmap,
}

/// A uniform, read-only view over a monotone id sequence (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct IdArray {
    representation: Representation,
    direction: Direction,
    ids: Vec<Id>,
}

impl IdArray {
    /// Wrap a single inlined id.
    pub fn singleton(id: Id) -> Self {
        IdArray {
            representation: Representation::Singleton,
            direction: Direction::Forward,
            ids: vec![id],
        }
    }

    /// Wrap a short array already read from a bucket page. `direction`
    /// describes the order the caller asserts the array is sorted in;
    /// debug builds verify it.
    pub fn bucket(ids: Vec<Id>, direction: Direction) -> Result<Self> {
        check_monotone(&ids, direction)?;
        Ok(IdArray {
            representation: Representation::Bucket,
            direction,
            ids,
        })
    }

    /// Materialize a GMAP chain starting at `head` into an `IdArray`.
    /// Chains are stored ascending; `direction` only controls how
    /// `search` and iteration subsequently traverse the materialized
    /// sequence.
    pub fn gmap_chain(
        cache: &TileCache,
        gmap: &GmapPartition,
        head: u64,
        direction: Direction,
    ) -> Result<Self> {
        let mut ids = gmap.collect_chain(cache, head)?;
        if direction == Direction::Backward {
            ids.reverse();
        }
        check_monotone(&ids, direction)?;
        Ok(IdArray {
            representation: Representation::GmapChain,
            direction,
            ids,
        })
    }

    /// Wrap the set bits of a bitmap as an ascending id sequence.
    pub fn bitmap(bitmap: &crate::bitmap::Bitmap) -> Self {
        IdArray {
            representation: Representation::Bitmap,
            direction: Direction::Forward,
            ids: bitmap.to_sorted_ids(),
        }
    }

    /// Which physical representation this view was built from.
    pub fn representation(&self) -> Representation {
        self.representation
    }

    /// The declared sort direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of ids in the sequence.
    pub fn len(&self) -> u64 {
        self.ids.len() as u64
    }

    /// `true` if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Decode ids at offsets `[start, end)` into `buf`, returning the
    /// count actually written. `end` is clipped to `len()` rather than
    /// treated as an error (spec.md §4.2 `read`).
    pub fn read(&self, start: u64, end: u64, buf: &mut Vec<Id>) -> u64 {
        let len = self.len();
        if start >= len {
            return 0;
        }
        let end = end.min(len);
        if end <= start {
            return 0;
        }
        let slice = &self.ids[start as usize..end as usize];
        buf.extend_from_slice(slice);
        slice.len() as u64
    }

    /// Read the single id at `offset`.
    pub fn read1(&self, offset: u64) -> Result<Id> {
        self.ids
            .get(offset as usize)
            .copied()
            .ok_or(PrimitivesError::OutOfBounds(offset, self.len()))
    }

    /// Binary search `[lo, hi)` for `id`, returning the first offset whose
    /// value is `>= id` (forward direction) or `<= id` (backward), plus
    /// the id actually found there. An exact match has `actual_id == id`
    /// (spec.md §4.2 `search`).
    pub fn search(&self, lo: u64, hi: u64, id: Id) -> Result<(u64, Id)> {
        let hi = hi.min(self.len());
        if lo >= hi {
            return Err(PrimitivesError::OutOfBounds(lo, self.len()));
        }
        let slice = &self.ids[lo as usize..hi as usize];
        let pos = match self.direction {
            // First index with value >= id.
            Direction::Forward => slice.partition_point(|&x| x < id),
            // `slice` is descending; first index with value <= id.
            Direction::Backward => slice.partition_point(|&x| x > id),
        };
        if pos >= slice.len() {
            // No element satisfies the search direction's comparator;
            // return the boundary with whatever sits at the edge.
            let edge = slice.len() - 1;
            return Ok((lo + edge as u64, slice[edge]));
        }
        Ok((lo + pos as u64, slice[pos]))
    }
}

fn check_monotone(ids: &[Id], direction: Direction) -> Result<()> {
    for (i, pair) in ids.windows(2).enumerate() {
        let ordered = match direction {
            Direction::Forward => pair[0] < pair[1],
            Direction::Backward => pair[0] > pair[1],
        };
        if !ordered {
            return Err(PrimitivesError::NotMonotone(i as u64));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(vals: &[u64]) -> Vec<Id> {
        vals.iter().map(|&v| Id::new(v).unwrap()).collect()
    }

    #[test]
    fn singleton_has_len_one() {
        let arr = IdArray::singleton(Id::new(5).unwrap());
        assert_eq!(arr.len(), 1);
        assert_eq!(arr.read1(0).unwrap(), Id::new(5).unwrap());
    }

    #[test]
    fn bucket_rejects_non_monotone() {
        let bad = ids(&[5, 3, 9]);
        assert!(IdArray::bucket(bad, Direction::Forward).is_err());
    }

    #[test]
    fn read_clips_end_to_len() {
        let arr = IdArray::bucket(ids(&[1, 2, 3]), Direction::Forward).unwrap();
        let mut buf = Vec::new();
        let n = arr.read(1, 100, &mut buf);
        assert_eq!(n, 2);
        assert_eq!(buf, ids(&[2, 3]));
    }

    #[test]
    fn search_forward_finds_first_ge() {
        let arr = IdArray::bucket(ids(&[2, 4, 6, 8]), Direction::Forward).unwrap();
        let (off, found) = arr.search(0, 4, Id::new(5).unwrap()).unwrap();
        assert_eq!(off, 2);
        assert_eq!(found, Id::new(6).unwrap());

        let (off, found) = arr.search(0, 4, Id::new(6).unwrap()).unwrap();
        assert_eq!(off, 2);
        assert_eq!(found, Id::new(6).unwrap());
    }

    #[test]
    fn search_backward_finds_first_le() {
        let arr = IdArray::bucket(ids(&[8, 6, 4, 2]), Direction::Backward).unwrap();
        let (off, found) = arr.search(0, 4, Id::new(5).unwrap()).unwrap();
        assert_eq!(off, 2);
        assert_eq!(found, Id::new(4).unwrap());
    }
}
