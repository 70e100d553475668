//! The set iterator algebra (spec.md §4): leaf producers, the AND
//! intersection operator with its statistics-driven optimizer, the sort
//! wrapper, and the comparator contract that lets typed fields plug
//! range/equality lookups into an AND tree.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod and_iter;
pub mod cache;
pub mod comparator;
pub mod iterator;
pub mod leaf;
pub mod sort;

pub use and_iter::{commit, thaw, thaw_any, AndIterator, CommitOutcome};
pub use cache::{CacheEntry, IteratorCache};
pub use comparator::{Comparator, NumericComparator, VrangeBin, VrangeWalker, VRANGE_ITERATOR_COST};
pub use iterator::{FreezeFlags, RangeEstimate, RestrictOutcome, SetIterator};
pub use leaf::{AllIterator, FixedIterator, IdSetIterator, NullIterator};
pub use sort::{drain_sorted, SortCapExceeded, SortedIterator, SORT_CAP};
