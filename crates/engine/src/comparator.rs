//! The comparator interface (spec.md §4.7): the external contract a
//! value-keyed field type implements so the AND iterator can build
//! equality/range producers over it, plus the value-range bin-walker
//! state machine used for `between x and y`-shaped constraints.

use crate::iterator::SetIterator;
use gravel_core::id::Id;
use gravel_core::{Budget, Direction, StatStep};
use std::cmp::Ordering;

/// Per-`it_next` budget charge for a vrange bin walk (spec.md §9's open
/// question about `number_vrange_it_next`'s budget accounting). Charged
/// against the caller's actual budget once per bin advanced, not against
/// a local copy, so suspension and resumption account for real work done
/// even across the typo'd decrement the source took on the bare pointer.
pub const VRANGE_ITERATOR_COST: i64 = 4;

/// The external contract a comparator implements over some value domain
/// (spec.md §4.7). `V` is the comparator's value type (e.g. `u64` for a
/// numeric field, a byte string for a string field).
pub trait Comparator<V>: Send + Sync {
    /// Order two values.
    fn compare(&self, a: &V, b: &V) -> Ordering;

    /// Build a producer over every id in `[low, high)` whose value equals
    /// `value`, or `None` if no such primitive exists.
    fn make_equality_iterator(
        &self,
        value: &V,
        low: Id,
        high: Id,
        direction: Direction,
    ) -> Option<Box<dyn SetIterator>>;

    /// Build a producer over every id in `[low, high)` whose value falls
    /// in `[lo, hi)` per [`Comparator::compare`], or `None` if the
    /// comparator cannot serve a contiguous range directly (the AND falls
    /// back to the vrange bin walker in that case).
    fn make_range_iterator(
        &self,
        lo: &V,
        hi: &V,
        direction: Direction,
    ) -> Option<Box<dyn SetIterator>>;
}

/// One bin of the value-range walk: a half-open value interval plus the
/// GMAP-backed id producer for it. Bins are supplied in the comparator's
/// sort order; the walker advances through them lazily.
pub struct VrangeBin<V> {
    /// Lower bound of this bin's value interval (inclusive).
    pub lo: V,
    /// Upper bound of this bin's value interval (exclusive).
    pub hi: V,
    /// The bin's id producer. Built lazily by the caller and handed to
    /// the walker already positioned at its start.
    pub producer: Box<dyn SetIterator>,
}

/// The `vrange_{size,start,it_next,statistics,seek,freeze,thaw,
/// value_in_range}` bin-walker state machine (spec.md §4.7). The AND
/// iterator drives this the same way it drives any other subiterator:
/// `it_next` emits one bin's producer at a time.
pub struct VrangeWalker<V> {
    bins: Vec<VrangeBin<V>>,
    direction: Direction,
    cursor: usize,
    done: bool,
}

impl<V> VrangeWalker<V> {
    /// Start a walk over `bins`, already ordered to match `direction`.
    pub fn start(bins: Vec<VrangeBin<V>>, direction: Direction) -> Self {
        let done = bins.is_empty();
        VrangeWalker { bins, direction, cursor: 0, done }
    }

    /// Number of bins in the walk (`vrange_size`).
    pub fn size(&self) -> usize {
        self.bins.len()
    }

    /// The walk's declared direction (`vrange_start`'s direction
    /// argument, retained for `it_next`).
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Advance to the next bin's producer, charging
    /// [`VRANGE_ITERATOR_COST`] against `budget` directly (not a stashed
    /// local copy — see [`VRANGE_ITERATOR_COST`]'s doc comment).
    pub fn it_next(&mut self, budget: &mut Budget) -> Option<&mut Box<dyn SetIterator>> {
        if self.done || !budget.charge(VRANGE_ITERATOR_COST) {
            return None;
        }
        if self.cursor >= self.bins.len() {
            self.done = true;
            return None;
        }
        let idx = self.cursor;
        self.cursor += 1;
        Some(&mut self.bins[idx].producer)
    }

    /// Drive every bin's one-shot `statistics` to completion under
    /// `budget`, suspending with [`StatStep::NeedMoreBudget`] if it runs
    /// out partway through.
    pub fn statistics(&mut self, budget: &mut Budget) -> StatStep {
        for bin in &mut self.bins[self.cursor..] {
            loop {
                match bin.producer.statistics(budget) {
                    StatStep::Done => break,
                    StatStep::NeedMoreBudget => return StatStep::NeedMoreBudget,
                }
            }
        }
        StatStep::Done
    }

    /// Skip ahead to the first bin whose interval could contain `value`,
    /// per `cmp`. Bins before it are dropped from the walk entirely (they
    /// can never be visited again in this direction).
    pub fn seek(&mut self, value: &V, cmp: &dyn Comparator<V>) {
        while self.cursor < self.bins.len() {
            if self.value_in_range(&self.bins[self.cursor], value, cmp)
                || matches!(cmp.compare(value, &self.bins[self.cursor].hi), Ordering::Less)
            {
                break;
            }
            self.cursor += 1;
        }
        if self.cursor >= self.bins.len() {
            self.done = true;
        }
    }

    /// `true` if `value` falls within `bin`'s interval.
    pub fn value_in_range(&self, bin: &VrangeBin<V>, value: &V, cmp: &dyn Comparator<V>) -> bool {
        cmp.compare(value, &bin.lo) != Ordering::Less && cmp.compare(value, &bin.hi) == Ordering::Less
    }

    /// `true` once every bin has been handed out via `it_next`.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

/// A [`Comparator`] over raw `u64` values, backing numeric fields. Ranges
/// and equality both reduce directly to an [`gravel_core::id::IdRange`]-shaped
/// lookup the caller supplies via `lookup`.
pub struct NumericComparator<F>
where
    F: Fn(u64, u64, Id, Id, Direction) -> Option<Box<dyn SetIterator>> + Send + Sync,
{
    lookup: F,
}

impl<F> NumericComparator<F>
where
    F: Fn(u64, u64, Id, Id, Direction) -> Option<Box<dyn SetIterator>> + Send + Sync,
{
    /// Build a numeric comparator whose range/equality producers are
    /// supplied by `lookup(value_lo, value_hi_exclusive, id_low, id_high,
    /// direction)`.
    pub fn new(lookup: F) -> Self {
        NumericComparator { lookup }
    }
}

impl<F> Comparator<u64> for NumericComparator<F>
where
    F: Fn(u64, u64, Id, Id, Direction) -> Option<Box<dyn SetIterator>> + Send + Sync,
{
    fn compare(&self, a: &u64, b: &u64) -> Ordering {
        a.cmp(b)
    }

    fn make_equality_iterator(
        &self,
        value: &u64,
        low: Id,
        high: Id,
        direction: Direction,
    ) -> Option<Box<dyn SetIterator>> {
        (self.lookup)(*value, value + 1, low, high, direction)
    }

    fn make_range_iterator(&self, lo: &u64, hi: &u64, direction: Direction) -> Option<Box<dyn SetIterator>> {
        (self.lookup)(*lo, *hi, Id::MIN, Id::MAX, direction)
    }
}
