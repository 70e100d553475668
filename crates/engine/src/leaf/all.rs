//! The ALL iterator: produces every id in a half-open range (spec.md
//! §4.5.1 step 2, "scans are dominated" — the universal producer every
//! other subtree is measured against).
//!
//! There is no existence oracle wired into this layer: an `ALL` subtree
//! enumerates every integer id in `[low, high)` in its declared
//! direction rather than consulting a partition for which ids actually
//! exist. This mirrors the role ALL plays in the optimizer (a worst-case
//! stand-in that other producers get compared against and, ideally,
//! eliminated in favor of) rather than a real scan of stored data; a
//! primitive-backed variant that filters against an existence set would
//! sit alongside this one if the higher layers ever need one.

use crate::iterator::{FreezeFlags, RangeEstimate, RestrictOutcome, SetIterator};
use gravel_core::id::{Id, IdRange};
use gravel_core::summary::PrimitiveSummary;
use gravel_core::{Budget, Check, Direction, Statistics, StatStep, Step};

/// A producer over every id in `[low, high)`.
#[derive(Debug, Clone, Copy)]
pub struct AllIterator {
    range: IdRange,
    direction: Direction,
    cursor: Option<Id>,
    done: bool,
}

impl AllIterator {
    /// Create an ALL producer over `range` in `direction`.
    pub fn new(range: IdRange, direction: Direction) -> Self {
        let done = range.is_empty();
        AllIterator { range, direction, cursor: None, done }
    }

    fn first(&self) -> Id {
        match self.direction {
            Direction::Forward => self.range.low,
            Direction::Backward => self.range.high.prev().unwrap_or(self.range.low),
        }
    }

    fn advance(&self, from: Id) -> Option<Id> {
        match self.direction {
            Direction::Forward => from.next().filter(|&n| self.range.contains(n)),
            Direction::Backward => from.prev().filter(|&n| self.range.contains(n)),
        }
    }
}

impl SetIterator for AllIterator {
    fn next(&mut self, budget: &mut Budget) -> Step<Id> {
        if !budget.charge(1) {
            return Step::NeedMoreBudget;
        }
        if self.done {
            return Step::EndOfSet;
        }
        let id = match self.cursor {
            None => self.first(),
            Some(prev) => match self.advance(prev) {
                Some(id) => id,
                None => {
                    self.done = true;
                    return Step::EndOfSet;
                }
            },
        };
        self.cursor = Some(id);
        Step::Ready(id)
    }

    fn find(&mut self, id: Id, budget: &mut Budget) -> Step<Id> {
        if !budget.charge(1) {
            return Step::NeedMoreBudget;
        }
        if self.done {
            return Step::EndOfSet;
        }
        let landed = match self.direction {
            Direction::Forward => {
                if id < self.range.low {
                    self.range.low
                } else {
                    id
                }
            }
            Direction::Backward => {
                if id >= self.range.high {
                    match self.range.high.prev() {
                        Some(p) => p,
                        None => {
                            self.done = true;
                            return Step::EndOfSet;
                        }
                    }
                } else {
                    id
                }
            }
        };
        if !self.range.contains(landed) {
            self.done = true;
            return Step::EndOfSet;
        }
        self.cursor = Some(landed);
        Step::Ready(landed)
    }

    fn check(&mut self, id: Id, budget: &mut Budget) -> Check {
        if !budget.charge(1) {
            return Check::NeedMoreBudget;
        }
        if self.range.contains(id) {
            Check::Yes
        } else {
            Check::No
        }
    }

    fn statistics(&mut self, _budget: &mut Budget) -> StatStep {
        StatStep::Done
    }

    fn stats(&self) -> Statistics {
        let n = (self.range.high.get() - self.range.low.get()).min(i64::MAX as u64);
        Statistics {
            n: Some(n),
            check_cost: 1,
            next_cost: 1,
            find_cost: 1,
            sorted: true,
            ordered: true,
            ordering: Some(self.direction),
            done: true,
        }
    }

    fn reset(&mut self) {
        self.cursor = None;
        self.done = self.range.is_empty();
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn clone_box(&self) -> Box<dyn SetIterator> {
        Box::new(*self)
    }

    fn freeze(&self, _flags: FreezeFlags) -> String {
        match self.cursor {
            Some(c) => format!("all[{},{})@{}", self.range.low.get(), self.range.high.get(), c.get()),
            None => format!("all[{},{})", self.range.low.get(), self.range.high.get()),
        }
    }

    fn primitive_summary(&self) -> PrimitiveSummary {
        PrimitiveSummary::unconstrained()
    }

    fn range_estimate(&self) -> RangeEstimate {
        RangeEstimate {
            lo: Some(self.range.low),
            hi: self.range.high.prev(),
            n_max: Some(self.range.high.get().saturating_sub(self.range.low.get())),
            n_exact: true,
        }
    }

    fn beyond(&self, lo: Id, hi: Id) -> bool {
        self.range.high <= lo || self.range.low >= hi
    }

    fn restrict(&self, psum: PrimitiveSummary) -> RestrictOutcome {
        if psum == PrimitiveSummary::unconstrained() {
            RestrictOutcome::Already
        } else {
            RestrictOutcome::NoneContradicts
        }
    }
}

/// Reconstruct an [`AllIterator`] from the body produced by
/// [`SetIterator::freeze`].
pub fn thaw(body: &str, direction: Direction) -> Option<AllIterator> {
    let (range_part, cursor) = match body.split_once('@') {
        Some((r, c)) => (r, Some(c.parse::<u64>().ok()?)),
        None => (body, None),
    };
    let bounds = range_part.strip_prefix("all[")?.strip_suffix(')')?;
    let (lo, hi) = bounds.split_once(',')?;
    let low = Id::new(lo.parse().ok()?).ok()?;
    let high = Id::new(hi.parse().ok()?).ok()?;
    let mut it = AllIterator::new(IdRange { low, high }, direction);
    if let Some(c) = cursor {
        it.cursor = Some(Id::new(c).ok()?);
    }
    Some(it)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> Id {
        Id::new(n).unwrap()
    }

    fn range(lo: u64, hi: u64) -> IdRange {
        IdRange { low: id(lo), high: id(hi) }
    }

    #[test]
    fn forward_walks_every_id() {
        let mut it = AllIterator::new(range(5, 9), Direction::Forward);
        let mut budget = Budget::new(100);
        let mut out = Vec::new();
        loop {
            match it.next(&mut budget) {
                Step::Ready(x) => out.push(x.get()),
                Step::EndOfSet => break,
                Step::NeedMoreBudget => panic!("budget exhausted unexpectedly"),
            }
        }
        assert_eq!(out, vec![5, 6, 7, 8]);
    }

    #[test]
    fn backward_walks_every_id_descending() {
        let mut it = AllIterator::new(range(5, 9), Direction::Backward);
        let mut budget = Budget::new(100);
        let mut out = Vec::new();
        loop {
            match it.next(&mut budget) {
                Step::Ready(x) => out.push(x.get()),
                Step::EndOfSet => break,
                Step::NeedMoreBudget => panic!("budget exhausted unexpectedly"),
            }
        }
        assert_eq!(out, vec![8, 7, 6, 5]);
    }

    #[test]
    fn empty_range_is_immediately_done() {
        let mut it = AllIterator::new(range(5, 5), Direction::Forward);
        let mut budget = Budget::new(100);
        assert_eq!(it.next(&mut budget), Step::EndOfSet);
    }

    #[test]
    fn beyond_detects_disjoint_probe_range() {
        let it = AllIterator::new(range(10, 20), Direction::Forward);
        assert!(it.beyond(id(1), id(5)));
        assert!(!it.beyond(id(1), id(15)));
    }

    #[test]
    fn freeze_thaw_roundtrips_position() {
        let mut it = AllIterator::new(range(5, 9), Direction::Forward);
        let mut budget = Budget::new(100);
        it.next(&mut budget);
        it.next(&mut budget);
        let s = it.freeze(FreezeFlags::default());
        let mut back = thaw(&s, Direction::Forward).unwrap();
        assert_eq!(back.next(&mut budget), Step::Ready(id(7)));
    }

    #[test]
    fn thaw_before_any_next_call_resumes_at_the_start() {
        let it = AllIterator::new(range(5, 9), Direction::Forward);
        let s = it.freeze(FreezeFlags::default());
        let mut back = thaw(&s, Direction::Forward).unwrap();
        let mut budget = Budget::new(100);
        assert_eq!(back.next(&mut budget), Step::Ready(id(5)));
    }
}
