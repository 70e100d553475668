//! The intersect kernel: a two-pointer merge over two sorted id ranges,
//! the AND optimizer's "small set" fast path (spec.md §4.2 "Intersect
//! kernel").

use crate::idarray::IdArray;
use gravel_core::direction::Direction;
use gravel_core::id::Id;

/// Intersect `a[a_lo..a_hi)` with `b[b_lo..b_hi)`, both assumed sorted in
/// the same direction, appending the common ids to `buf` and returning
/// how many were found.
///
/// A bitmap-backed operand short-circuits to membership tests against the
/// other, shorter side rather than walking both in lockstep — the same
/// trade spec.md calls out for bitmap representations.
pub fn idarray_intersect(
    a: &IdArray,
    a_lo: u64,
    a_hi: u64,
    b: &IdArray,
    b_lo: u64,
    b_hi: u64,
    buf: &mut Vec<Id>,
) -> u64 {
    debug_assert_eq!(a.direction(), b.direction());

    if matches!(a.representation(), crate::idarray::Representation::Bitmap)
        && (b_hi - b_lo) < (a_hi - a_lo)
    {
        return probe_against_membership(b, b_lo, b_hi, a, buf);
    }
    if matches!(b.representation(), crate::idarray::Representation::Bitmap)
        && (a_hi - a_lo) < (b_hi - b_lo)
    {
        return probe_against_membership(a, a_lo, a_hi, b, buf);
    }

    merge_two_pointer(a, a_lo, a_hi, b, b_lo, b_hi, buf)
}

fn merge_two_pointer(
    a: &IdArray,
    a_lo: u64,
    a_hi: u64,
    b: &IdArray,
    b_lo: u64,
    b_hi: u64,
    buf: &mut Vec<Id>,
) -> u64 {
    let direction = a.direction();
    let mut i = a_lo;
    let mut j = b_lo;
    let mut count = 0u64;
    while i < a_hi && j < b_hi {
        let av = a.read1(i).expect("bounds checked by loop condition");
        let bv = b.read1(j).expect("bounds checked by loop condition");
        let ordering = av.cmp(&bv);
        let ordering = if direction == Direction::Backward {
            ordering.reverse()
        } else {
            ordering
        };
        match ordering {
            std::cmp::Ordering::Equal => {
                buf.push(av);
                count += 1;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    count
}

fn probe_against_membership(
    small: &IdArray,
    small_lo: u64,
    small_hi: u64,
    big: &IdArray,
    buf: &mut Vec<Id>,
) -> u64 {
    let mut count = 0u64;
    for off in small_lo..small_hi {
        let id = small.read1(off).expect("bounds checked by loop range");
        if let Ok((_pos, found)) = big.search(0, big.len(), id) {
            if found == id {
                buf.push(id);
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use proptest::prop_assert_eq;

    fn ids(vals: &[u64]) -> Vec<Id> {
        vals.iter().map(|&v| Id::new(v).unwrap()).collect()
    }

    #[test]
    fn merge_finds_common_elements() {
        let a = IdArray::bucket(ids(&[1, 2, 3, 5, 8]), Direction::Forward).unwrap();
        let b = IdArray::bucket(ids(&[2, 3, 4, 8, 9]), Direction::Forward).unwrap();
        let mut buf = Vec::new();
        let n = idarray_intersect(&a, 0, a.len(), &b, 0, b.len(), &mut buf);
        assert_eq!(n, 3);
        assert_eq!(buf, ids(&[2, 3, 8]));
    }

    #[test]
    fn merge_handles_backward_direction() {
        let a = IdArray::bucket(ids(&[8, 5, 3, 2, 1]), Direction::Backward).unwrap();
        let b = IdArray::bucket(ids(&[9, 8, 4, 3, 2]), Direction::Backward).unwrap();
        let mut buf = Vec::new();
        let n = idarray_intersect(&a, 0, a.len(), &b, 0, b.len(), &mut buf);
        assert_eq!(n, 3);
        assert_eq!(buf, ids(&[8, 3, 2]));
    }

    #[test]
    fn bitmap_side_short_circuits_to_membership() {
        let bm = Bitmap::from_sorted_ids(&ids(&[1, 2, 3, 4, 5, 100, 200]));
        let a = IdArray::bitmap(&bm);
        let b = IdArray::bucket(ids(&[3, 4, 300]), Direction::Forward).unwrap();
        let mut buf = Vec::new();
        let n = idarray_intersect(&a, 0, a.len(), &b, 0, b.len(), &mut buf);
        assert_eq!(n, 2);
        assert_eq!(buf, ids(&[3, 4]));
    }

    #[test]
    fn empty_ranges_yield_no_matches() {
        let a = IdArray::bucket(ids(&[1, 2]), Direction::Forward).unwrap();
        let b = IdArray::bucket(Vec::new(), Direction::Forward).unwrap();
        let mut buf = Vec::new();
        assert_eq!(idarray_intersect(&a, 0, a.len(), &b, 0, b.len(), &mut buf), 0);
    }

    proptest::proptest! {
        #[test]
        fn merge_matches_set_intersection(
            xs in proptest::collection::btree_set(1u64..500, 0..40),
            ys in proptest::collection::btree_set(1u64..500, 0..40),
        ) {
            let expected: Vec<u64> = xs.intersection(&ys).copied().collect();
            let a = IdArray::bucket(
                xs.iter().map(|&v| Id::new(v).unwrap()).collect(),
                Direction::Forward,
            ).unwrap();
            let b = IdArray::bucket(
                ys.iter().map(|&v| Id::new(v).unwrap()).collect(),
                Direction::Forward,
            ).unwrap();
            let mut buf = Vec::new();
            idarray_intersect(&a, 0, a.len(), &b, 0, b.len(), &mut buf);
            let got: Vec<u64> = buf.iter().map(|id| id.get()).collect();
            prop_assert_eq!(got, expected);
        }
    }
}
