//! Primitive summaries ("psum") — partial fingerprints of which linkage
//! fields a subtree of the iterator tree has pinned to a specific value
//! (spec.md §4.5.1 steps 3–5, glossary "Primitive summary").

use crate::Id;

/// One linkage field's lock state within a [`PrimitiveSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lock {
    /// The subtree does not constrain this field.
    Free,
    /// The subtree requires this field to equal exactly this id.
    Locked(Id),
}

impl Lock {
    fn subsumed_by(self, other: Lock) -> bool {
        match self {
            Lock::Free => true,
            Lock::Locked(v) => other == Lock::Locked(v),
        }
    }
}

/// Which of `typeguid`, `left`, `right` a subtree of the AND tree locks to
/// a concrete value, and to what.
///
/// Used three ways in the optimizer (spec.md §4.5.1):
/// - VIP combination (step 3) fuses subtrees that collectively lock
///   `typeguid` plus `left` or `right`;
/// - psum subsumption (step 4) drops a subtree whose summary is a
///   superset (less specific) of another's;
/// - improve-on-ALL (step 5) looks for the smallest iterator compatible
///   with a partially-locked summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrimitiveSummary {
    /// Lock state of the `typeguid` field.
    pub typeguid: Option<Id>,
    /// Lock state of the `left` field.
    pub left: Option<Id>,
    /// Lock state of the `right` field.
    pub right: Option<Id>,
}

impl PrimitiveSummary {
    /// The summary that constrains nothing.
    pub fn unconstrained() -> Self {
        PrimitiveSummary::default()
    }

    fn field(&self, which: Field) -> Lock {
        let value = match which {
            Field::TypeGuid => self.typeguid,
            Field::Left => self.left,
            Field::Right => self.right,
        };
        value.map_or(Lock::Free, Lock::Locked)
    }

    /// `true` if `self` matches at least as many primitives as `other`
    /// does, i.e. `self`'s constraint set is a superset of `other`'s. A
    /// subtree with a subsuming summary adds nothing once the other
    /// subtree is present (spec.md §4.5.1 step 4).
    pub fn subsumes(&self, other: &PrimitiveSummary) -> bool {
        [Field::TypeGuid, Field::Left, Field::Right]
            .into_iter()
            .all(|f| self.field(f).subsumed_by(other.field(f)))
    }

    /// `true` if both `typeguid` and at least one of `left`/`right` are
    /// locked — the condition for VIP fusion (spec.md §4.5.1 step 3).
    pub fn vip_eligible(&self) -> bool {
        self.typeguid.is_some() && (self.left.is_some() || self.right.is_some())
    }

    /// Merge two summaries' locks. Conflicting locks on the same field
    /// (both non-`None` but unequal) make the combined constraint
    /// unsatisfiable; callers treat that as a NULL subtree (spec.md
    /// §4.5.1 step 8).
    pub fn merge(&self, other: &PrimitiveSummary) -> Option<PrimitiveSummary> {
        fn merge_field(a: Option<Id>, b: Option<Id>) -> Option<Option<Id>> {
            match (a, b) {
                (Some(x), Some(y)) if x != y => None,
                (Some(x), _) | (_, Some(x)) => Some(Some(x)),
                (None, None) => Some(None),
            }
        }
        Some(PrimitiveSummary {
            typeguid: merge_field(self.typeguid, other.typeguid)?,
            left: merge_field(self.left, other.left)?,
            right: merge_field(self.right, other.right)?,
        })
    }
}

#[derive(Clone, Copy)]
enum Field {
    TypeGuid,
    Left,
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> Id {
        Id::new(n).unwrap()
    }

    #[test]
    fn free_summary_is_subsumed_by_everything() {
        let free = PrimitiveSummary::unconstrained();
        let locked = PrimitiveSummary {
            typeguid: Some(id(1)),
            ..Default::default()
        };
        assert!(free.subsumes(&locked));
        assert!(!locked.subsumes(&free));
    }

    #[test]
    fn equal_locks_subsume_each_other() {
        let a = PrimitiveSummary {
            typeguid: Some(id(1)),
            ..Default::default()
        };
        let b = a;
        assert!(a.subsumes(&b));
        assert!(b.subsumes(&a));
    }

    #[test]
    fn vip_needs_typeguid_and_a_side() {
        let just_type = PrimitiveSummary {
            typeguid: Some(id(1)),
            ..Default::default()
        };
        assert!(!just_type.vip_eligible());

        let type_and_left = PrimitiveSummary {
            typeguid: Some(id(1)),
            left: Some(id(2)),
            ..Default::default()
        };
        assert!(type_and_left.vip_eligible());
    }

    #[test]
    fn merge_conflicting_locks_fails() {
        let a = PrimitiveSummary {
            typeguid: Some(id(1)),
            ..Default::default()
        };
        let b = PrimitiveSummary {
            typeguid: Some(id(2)),
            ..Default::default()
        };
        assert!(a.merge(&b).is_none());
    }

    #[test]
    fn merge_compatible_locks_unions_fields() {
        let a = PrimitiveSummary {
            typeguid: Some(id(1)),
            ..Default::default()
        };
        let b = PrimitiveSummary {
            left: Some(id(2)),
            ..Default::default()
        };
        let m = a.merge(&b).unwrap();
        assert_eq!(m.typeguid, Some(id(1)));
        assert_eq!(m.left, Some(id(2)));
    }
}
