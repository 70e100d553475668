//! The id-set iterator: a leaf producer over an already-materialized
//! [`IdArray`] (spec.md §4.5.1's "primitive-set producers" — HMAP/GMAP
//! lookups and VIP linkage all surface here once decoded).

use crate::iterator::{FreezeFlags, RangeEstimate, RestrictOutcome, SetIterator};
use gravel_core::id::Id;
use gravel_core::summary::PrimitiveSummary;
use gravel_core::{Budget, Check, Direction, Statistics, StatStep, Step};
use gravel_primitives::IdArray;
use std::sync::Arc;

/// A producer backed by a shared [`IdArray`] plus the primitive summary
/// the lookup that built it pinned down (e.g. a VIP's `typeguid`/`left`
/// lock).
#[derive(Debug, Clone)]
pub struct IdSetIterator {
    array: Arc<IdArray>,
    summary: PrimitiveSummary,
    pos: u64,
}

impl IdSetIterator {
    /// Wrap `array`, tagging it with the primitive summary its lookup
    /// pinned (pass [`PrimitiveSummary::unconstrained`] for a plain scan).
    pub fn new(array: Arc<IdArray>, summary: PrimitiveSummary) -> Self {
        IdSetIterator { array, summary, pos: 0 }
    }
}

impl SetIterator for IdSetIterator {
    fn next(&mut self, budget: &mut Budget) -> Step<Id> {
        if !budget.charge(1) {
            return Step::NeedMoreBudget;
        }
        if self.pos >= self.array.len() {
            return Step::EndOfSet;
        }
        let id = self.array.read1(self.pos).expect("pos checked in bounds");
        self.pos += 1;
        Step::Ready(id)
    }

    fn find(&mut self, id: Id, budget: &mut Budget) -> Step<Id> {
        if !budget.charge(1) {
            return Step::NeedMoreBudget;
        }
        if self.pos >= self.array.len() {
            return Step::EndOfSet;
        }
        match self.array.search(self.pos, self.array.len(), id) {
            Ok((off, found)) => {
                let direction_ok = match self.array.direction() {
                    Direction::Forward => found >= id,
                    Direction::Backward => found <= id,
                };
                if !direction_ok {
                    self.pos = self.array.len();
                    return Step::EndOfSet;
                }
                self.pos = off + 1;
                Step::Ready(found)
            }
            Err(_) => {
                self.pos = self.array.len();
                Step::EndOfSet
            }
        }
    }

    fn check(&mut self, id: Id, budget: &mut Budget) -> Check {
        if !budget.charge(1) {
            return Check::NeedMoreBudget;
        }
        if self.array.is_empty() {
            return Check::No;
        }
        match self.array.search(0, self.array.len(), id) {
            Ok((_, found)) if found == id => Check::Yes,
            _ => Check::No,
        }
    }

    fn statistics(&mut self, _budget: &mut Budget) -> StatStep {
        StatStep::Done
    }

    fn stats(&self) -> Statistics {
        Statistics {
            n: Some(self.array.len() - self.pos.min(self.array.len())),
            check_cost: 20,
            next_cost: 5,
            find_cost: 20,
            sorted: true,
            ordered: true,
            ordering: Some(self.array.direction()),
            done: true,
        }
    }

    fn reset(&mut self) {
        self.pos = 0;
    }

    fn direction(&self) -> Direction {
        self.array.direction()
    }

    fn clone_box(&self) -> Box<dyn SetIterator> {
        Box::new(self.clone())
    }

    fn freeze(&self, _flags: FreezeFlags) -> String {
        format!("idset/{}", self.pos)
    }

    fn primitive_summary(&self) -> PrimitiveSummary {
        self.summary
    }

    fn range_estimate(&self) -> RangeEstimate {
        let remaining = self.array.len() - self.pos.min(self.array.len());
        let lo = self.array.read1(self.pos).ok();
        let hi = if self.array.is_empty() {
            None
        } else {
            self.array.read1(self.array.len() - 1).ok()
        };
        RangeEstimate {
            lo,
            hi,
            n_max: Some(remaining),
            n_exact: true,
        }
    }

    fn beyond(&self, lo: Id, hi: Id) -> bool {
        let remaining = self.array.len() - self.pos.min(self.array.len());
        if remaining == 0 {
            return true;
        }
        match (self.array.read1(self.pos), self.array.read1(self.array.len() - 1)) {
            (Ok(first), Ok(last)) => {
                let (min, max) = if first <= last { (first, last) } else { (last, first) };
                max < lo || min >= hi
            }
            _ => false,
        }
    }

    fn restrict(&self, psum: PrimitiveSummary) -> RestrictOutcome {
        match self.summary.merge(&psum) {
            None => RestrictOutcome::NoneContradicts,
            Some(merged) if merged == self.summary => RestrictOutcome::Already,
            Some(merged) => {
                let mut narrowed = self.clone();
                narrowed.summary = merged;
                RestrictOutcome::Narrowed(Box::new(narrowed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(vals: &[u64]) -> Vec<Id> {
        vals.iter().map(|&v| Id::new(v).unwrap()).collect()
    }

    #[test]
    fn walks_the_wrapped_array() {
        let arr = Arc::new(IdArray::bucket(ids(&[2, 4, 6]), Direction::Forward).unwrap());
        let mut it = IdSetIterator::new(arr, PrimitiveSummary::unconstrained());
        let mut budget = Budget::new(100);
        assert_eq!(it.next(&mut budget), Step::Ready(Id::new(2).unwrap()));
        assert_eq!(it.check(Id::new(6).unwrap(), &mut budget), Check::Yes);
        assert_eq!(it.check(Id::new(5).unwrap(), &mut budget), Check::No);
    }

    #[test]
    fn find_past_end_reports_eof() {
        let arr = Arc::new(IdArray::bucket(ids(&[2, 4, 6]), Direction::Forward).unwrap());
        let mut it = IdSetIterator::new(arr, PrimitiveSummary::unconstrained());
        let mut budget = Budget::new(100);
        assert_eq!(it.find(Id::new(100).unwrap(), &mut budget), Step::EndOfSet);
        assert_eq!(it.next(&mut budget), Step::EndOfSet);
    }

    #[test]
    fn beyond_detects_disjoint_ranges() {
        let arr = Arc::new(IdArray::bucket(ids(&[10, 20, 30]), Direction::Forward).unwrap());
        let it = IdSetIterator::new(arr, PrimitiveSummary::unconstrained());
        assert!(it.beyond(Id::new(1).unwrap(), Id::new(5).unwrap()));
        assert!(!it.beyond(Id::new(1).unwrap(), Id::new(15).unwrap()));
    }
}
