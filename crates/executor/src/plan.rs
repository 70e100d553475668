//! Build an iterator tree from typed constraints (spec.md §4.5.1 step
//! 2's "primitive-set producers" fed into the AND optimizer).

use gravel_core::id::{Id, IdRange};
use gravel_core::{Direction, Error, Result};
use gravel_engine::leaf::AllIterator;
use gravel_engine::{commit, CommitOutcome, IdSetIterator, SetIterator};
use gravel_primitives::IdArray;
use std::sync::Arc;

/// Which linkage field a constraint pins down, mirroring
/// [`gravel_core::primitive::Primitive`]'s fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The primitive's type.
    TypeGuid,
    /// The link's source endpoint.
    Left,
    /// The link's destination endpoint.
    Right,
}

/// One typed constraint a request can place on the result set.
#[derive(Debug, Clone)]
pub enum ConstraintSpec {
    /// `field == value`.
    Equals(Field, Id),
    /// No constraint at all — a full scan of the declared range.
    All,
}

/// Resolves an `Equals` constraint to the primitive ids satisfying it.
/// Implemented by whatever owns the HMAP/GMAP partitions (outside this
/// crate's scope); `None` means the field/value pair has no matches.
pub trait LinkageLookup: Send + Sync {
    /// Look up every id whose `field` equals `value`, already sorted in
    /// `direction`.
    fn lookup(&self, field: Field, value: Id, direction: Direction) -> Result<Option<IdArray>>;
}

/// Build one leaf subiterator per constraint.
fn build_leaf(
    constraint: &ConstraintSpec,
    lookup: &dyn LinkageLookup,
    range: IdRange,
    direction: Direction,
) -> Result<Box<dyn SetIterator>> {
    match constraint {
        ConstraintSpec::All => Ok(Box::new(AllIterator::new(range, direction))),
        ConstraintSpec::Equals(field, value) => {
            let summary = match field {
                Field::TypeGuid => gravel_core::summary::PrimitiveSummary {
                    typeguid: Some(*value),
                    ..Default::default()
                },
                Field::Left => gravel_core::summary::PrimitiveSummary {
                    left: Some(*value),
                    ..Default::default()
                },
                Field::Right => gravel_core::summary::PrimitiveSummary {
                    right: Some(*value),
                    ..Default::default()
                },
            };
            match lookup.lookup(*field, *value, direction)? {
                Some(array) => Ok(Box::new(IdSetIterator::new(Arc::new(array), summary))),
                None => Ok(Box::new(gravel_engine::NullIterator::new(direction))),
            }
        }
    }
}

/// Build every constraint's leaf, then run the AND optimizer over them
/// (spec.md §4.5.1). `constraints` must be non-empty; a bare full scan is
/// `&[ConstraintSpec::All]`.
pub fn build_and_commit(
    constraints: &[ConstraintSpec],
    lookup: &dyn LinkageLookup,
    range: IdRange,
    direction: Direction,
    budget: &mut gravel_core::Budget,
) -> Result<CommitOutcome> {
    if constraints.is_empty() {
        return Err(Error::Semantic("a query needs at least one constraint".into()));
    }
    let leaves: Result<Vec<_>> = constraints
        .iter()
        .map(|c| build_leaf(c, lookup, range, direction))
        .collect();
    Ok(commit(leaves?, direction, budget))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravel_core::{Check, Step};

    struct FixedLookup;

    impl LinkageLookup for FixedLookup {
        fn lookup(&self, field: Field, value: Id, direction: Direction) -> Result<Option<IdArray>> {
            let ids: Vec<Id> = match field {
                Field::TypeGuid if value.get() == 1 => {
                    (1u64..=100).filter(|n| n % 3 == 1).map(|n| Id::new(n).unwrap()).collect()
                }
                Field::Left if value.get() == 2 => {
                    (1u64..=100).filter(|n| n % 5 == 2).map(|n| Id::new(n).unwrap()).collect()
                }
                _ => return Ok(None),
            };
            Ok(Some(IdArray::bucket(ids, direction)?))
        }
    }

    fn id(n: u64) -> Id {
        Id::new(n).unwrap()
    }

    #[test]
    fn pure_and_intersection_matches_synthetic_dataset() {
        let lookup = FixedLookup;
        let constraints = vec![
            ConstraintSpec::Equals(Field::TypeGuid, id(1)),
            ConstraintSpec::Equals(Field::Left, id(2)),
        ];
        let range = IdRange { low: id(1), high: id(101) };
        let mut budget = gravel_core::Budget::new(1_000_000);
        let outcome =
            build_and_commit(&constraints, &lookup, range, Direction::Forward, &mut budget).unwrap();
        let mut it = match outcome {
            CommitOutcome::Resolved(it) => it,
            CommitOutcome::Suspended(_) => panic!("unexpected suspension"),
        };
        let mut out = Vec::new();
        loop {
            match it.next(&mut budget) {
                Step::Ready(x) => out.push(x.get()),
                Step::EndOfSet => break,
                Step::NeedMoreBudget => panic!("unexpected suspension"),
            }
        }
        assert_eq!(out, vec![7, 22, 37, 52, 67, 82, 97]);
    }

    #[test]
    fn unmatched_equals_yields_null() {
        let lookup = FixedLookup;
        let constraints = vec![ConstraintSpec::Equals(Field::TypeGuid, id(99))];
        let range = IdRange { low: id(1), high: id(101) };
        let mut budget = gravel_core::Budget::new(1_000_000);
        let outcome =
            build_and_commit(&constraints, &lookup, range, Direction::Forward, &mut budget).unwrap();
        let mut it = match outcome {
            CommitOutcome::Resolved(it) => it,
            CommitOutcome::Suspended(_) => panic!("unexpected suspension"),
        };
        assert_eq!(it.next(&mut budget), Step::EndOfSet);
        assert_eq!(it.check(id(1), &mut budget), Check::No);
    }
}
