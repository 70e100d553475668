//! The fixed iterator: a fully materialized, sorted array of ids
//! (spec.md §4.5.1 step 6 "Small-set pre-evaluation" and step 2's
//! contest-completion substitution).

use crate::iterator::{FreezeFlags, RangeEstimate, RestrictOutcome, SetIterator};
use gravel_core::id::Id;
use gravel_core::summary::PrimitiveSummary;
use gravel_core::{Budget, Check, Direction, Statistics, StatStep, Step};

/// An iterator over a small, already-known id set, kept sorted in its
/// declared direction.
#[derive(Debug, Clone)]
pub struct FixedIterator {
    ids: Vec<Id>,
    direction: Direction,
    pos: usize,
    summary: PrimitiveSummary,
}

impl FixedIterator {
    /// Wrap `ids`, which must already be sorted in `direction`.
    pub fn new(ids: Vec<Id>, direction: Direction) -> Self {
        FixedIterator {
            ids,
            direction,
            pos: 0,
            summary: PrimitiveSummary::unconstrained(),
        }
    }

    /// Attach a primitive summary describing the constraint this fixed
    /// set was materialized from (so `restrict`/subsumption checks still
    /// work after substitution).
    pub fn with_summary(mut self, summary: PrimitiveSummary) -> Self {
        self.summary = summary;
        self
    }

    fn cmp_for_direction(&self, a: Id, b: Id) -> std::cmp::Ordering {
        let ord = a.cmp(&b);
        if self.direction == Direction::Backward {
            ord.reverse()
        } else {
            ord
        }
    }
}

impl SetIterator for FixedIterator {
    fn next(&mut self, budget: &mut Budget) -> Step<Id> {
        if !budget.charge(1) {
            return Step::NeedMoreBudget;
        }
        if self.pos >= self.ids.len() {
            return Step::EndOfSet;
        }
        let id = self.ids[self.pos];
        self.pos += 1;
        Step::Ready(id)
    }

    fn find(&mut self, id: Id, budget: &mut Budget) -> Step<Id> {
        if !budget.charge(1) {
            return Step::NeedMoreBudget;
        }
        let tail = &self.ids[self.pos..];
        let offset = tail.partition_point(|&x| self.cmp_for_direction(x, id) == std::cmp::Ordering::Less);
        if offset >= tail.len() {
            self.pos = self.ids.len();
            return Step::EndOfSet;
        }
        self.pos += offset + 1;
        Step::Ready(tail[offset])
    }

    fn check(&mut self, id: Id, budget: &mut Budget) -> Check {
        if !budget.charge(1) {
            return Check::NeedMoreBudget;
        }
        if self.ids.binary_search_by(|x| self.cmp_for_direction(*x, id)).is_ok() {
            Check::Yes
        } else {
            Check::No
        }
    }

    fn statistics(&mut self, _budget: &mut Budget) -> StatStep {
        StatStep::Done
    }

    fn stats(&self) -> Statistics {
        Statistics {
            n: Some(self.ids.len() as u64),
            check_cost: 10,
            next_cost: 1,
            find_cost: 10,
            sorted: true,
            ordered: true,
            ordering: Some(self.direction),
            done: true,
        }
    }

    fn reset(&mut self) {
        self.pos = 0;
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn clone_box(&self) -> Box<dyn SetIterator> {
        Box::new(self.clone())
    }

    fn freeze(&self, _flags: FreezeFlags) -> String {
        let ids: Vec<String> = self.ids.iter().map(|id| id.get().to_string()).collect();
        format!("fixed[{}]/{}", ids.join(","), self.pos)
    }

    fn primitive_summary(&self) -> PrimitiveSummary {
        self.summary
    }

    fn range_estimate(&self) -> RangeEstimate {
        RangeEstimate {
            lo: self.ids.first().copied(),
            hi: self.ids.last().copied(),
            n_max: Some((self.ids.len() - self.pos.min(self.ids.len())) as u64),
            n_exact: true,
        }
    }

    fn beyond(&self, lo: Id, hi: Id) -> bool {
        self.ids[self.pos.min(self.ids.len())..]
            .iter()
            .all(|id| *id < lo || *id >= hi)
    }

    fn restrict(&self, psum: PrimitiveSummary) -> RestrictOutcome {
        match self.summary.merge(&psum) {
            None => RestrictOutcome::NoneContradicts,
            Some(merged) if merged == self.summary => RestrictOutcome::Already,
            Some(merged) => {
                RestrictOutcome::Narrowed(Box::new(self.clone().with_summary(merged)))
            }
        }
    }
}

/// Parse a `fixed[...]/pos` cursor produced by [`FixedIterator::freeze`].
pub fn thaw(body: &str, direction: Direction) -> Option<FixedIterator> {
    let (list, pos) = body.rsplit_once('/')?;
    let list = list.strip_prefix("fixed[")?.strip_suffix(']')?;
    let ids: Vec<Id> = if list.is_empty() {
        Vec::new()
    } else {
        list.split(',')
            .map(|s| s.parse::<u64>().ok().and_then(|n| Id::new(n).ok()))
            .collect::<Option<Vec<_>>>()?
    };
    let pos: usize = pos.parse().ok()?;
    let mut it = FixedIterator::new(ids, direction);
    it.pos = pos.min(it.ids.len());
    Some(it)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(vals: &[u64]) -> Vec<Id> {
        vals.iter().map(|&v| Id::new(v).unwrap()).collect()
    }

    #[test]
    fn next_walks_in_order() {
        let mut it = FixedIterator::new(ids(&[2, 4, 6]), Direction::Forward);
        let mut budget = Budget::new(100);
        assert_eq!(it.next(&mut budget), Step::Ready(Id::new(2).unwrap()));
        assert_eq!(it.next(&mut budget), Step::Ready(Id::new(4).unwrap()));
        assert_eq!(it.next(&mut budget), Step::Ready(Id::new(6).unwrap()));
        assert_eq!(it.next(&mut budget), Step::EndOfSet);
    }

    #[test]
    fn find_lands_on_first_ge() {
        let mut it = FixedIterator::new(ids(&[2, 4, 6, 8]), Direction::Forward);
        let mut budget = Budget::new(100);
        assert_eq!(it.find(Id::new(5).unwrap(), &mut budget), Step::Ready(Id::new(6).unwrap()));
        assert_eq!(it.next(&mut budget), Step::Ready(Id::new(8).unwrap()));
    }

    #[test]
    fn freeze_thaw_roundtrips_position() {
        let mut it = FixedIterator::new(ids(&[1, 2, 3]), Direction::Forward);
        let mut budget = Budget::new(100);
        it.next(&mut budget);
        let s = it.freeze(FreezeFlags::default());
        let back = thaw(&s, Direction::Forward).unwrap();
        assert_eq!(back.pos, 1);
        assert_eq!(back.ids, ids(&[1, 2, 3]));
    }
}
