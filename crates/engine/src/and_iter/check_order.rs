//! Check ordering (spec.md §4.5.3): the non-winner subiterators are
//! tried cheapest-first so a `No` short-circuits as early as possible.

use crate::iterator::SetIterator;

/// Compare two checkers by `check_cost` (cheaper first); ties break by
/// index so the order stays stable across re-sorts (spec.md §4.5.3
/// bubble-sort ordering, "stable across a refresh unless costs actually
/// changed").
fn cost_first(a: (usize, u32), b: (usize, u32)) -> std::cmp::Ordering {
    a.1.cmp(&b.1).then(a.0.cmp(&b.0))
}

/// Produce an index permutation over `checkers`, cheapest `check_cost`
/// first.
pub fn order_by_cost(checkers: &[Box<dyn SetIterator>]) -> Vec<usize> {
    let mut costed: Vec<(usize, u32)> = checkers
        .iter()
        .enumerate()
        .map(|(i, c)| (i, c.stats().check_cost))
        .collect();
    // Bubble sort: the subiterator count in a single AND is small enough
    // (typically single digits) that this is the same choice the source
    // makes, and it keeps a refresh after `evolve` cheap to reason about.
    let n = costed.len();
    for i in 0..n {
        for j in 0..n.saturating_sub(i + 1) {
            if cost_first(costed[j], costed[j + 1]) == std::cmp::Ordering::Greater {
                costed.swap(j, j + 1);
            }
        }
    }
    costed.into_iter().map(|(i, _)| i).collect()
}
