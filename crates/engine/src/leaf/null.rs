//! The null iterator: produces nothing (spec.md §4.5.1 step 8 "NULL
//! propagation").

use crate::iterator::{FreezeFlags, RangeEstimate, RestrictOutcome, SetIterator};
use gravel_core::id::Id;
use gravel_core::summary::PrimitiveSummary;
use gravel_core::{Budget, Check, Direction, Statistics, StatStep, Step};

/// An iterator over the empty set.
#[derive(Debug, Clone, Copy)]
pub struct NullIterator {
    direction: Direction,
}

impl NullIterator {
    /// Create a null iterator with the given declared direction.
    pub fn new(direction: Direction) -> Self {
        NullIterator { direction }
    }
}

impl SetIterator for NullIterator {
    fn next(&mut self, _budget: &mut Budget) -> Step<Id> {
        Step::EndOfSet
    }

    fn find(&mut self, _id: Id, _budget: &mut Budget) -> Step<Id> {
        Step::EndOfSet
    }

    fn check(&mut self, _id: Id, _budget: &mut Budget) -> Check {
        Check::No
    }

    fn statistics(&mut self, _budget: &mut Budget) -> StatStep {
        StatStep::Done
    }

    fn stats(&self) -> Statistics {
        Statistics {
            n: Some(0),
            check_cost: 1,
            next_cost: 1,
            find_cost: 1,
            sorted: true,
            ordered: true,
            ordering: Some(self.direction),
            done: true,
        }
    }

    fn reset(&mut self) {}

    fn direction(&self) -> Direction {
        self.direction
    }

    fn clone_box(&self) -> Box<dyn SetIterator> {
        Box::new(*self)
    }

    fn freeze(&self, _flags: FreezeFlags) -> String {
        "null[]".to_string()
    }

    fn primitive_summary(&self) -> PrimitiveSummary {
        PrimitiveSummary::unconstrained()
    }

    fn range_estimate(&self) -> RangeEstimate {
        RangeEstimate {
            lo: None,
            hi: None,
            n_max: Some(0),
            n_exact: true,
        }
    }

    fn beyond(&self, _lo: Id, _hi: Id) -> bool {
        true
    }

    fn restrict(&self, _psum: PrimitiveSummary) -> RestrictOutcome {
        RestrictOutcome::Already
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_eof() {
        let mut it = NullIterator::new(Direction::Forward);
        let mut budget = Budget::new(100);
        assert_eq!(it.next(&mut budget), Step::EndOfSet);
        assert_eq!(it.check(Id::new(1).unwrap(), &mut budget), Check::No);
    }
}
