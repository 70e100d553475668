//! The primitive record (spec.md §3 "Primitive").
//!
//! The write path, the reply value-tree, and the comparator
//! implementations are all out of scope (spec.md §1); this crate only
//! needs enough of a primitive to let the storage and iterator layers
//! address and filter them. The payload is carried as an opaque JSON
//! value, standing in for the externally-defined deserialized value
//! format (spec.md §6).

use crate::Id;
use serde::{Deserialize, Serialize};

/// An opaque payload value. The wire encoding and comparator semantics for
/// this are external contracts (spec.md §1); we only move it around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value(pub serde_json::Value);

/// An immutable node or typed link record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    /// Stable local id.
    pub id: Id,
    /// Source endpoint of a link, or `None` for a plain node.
    pub left: Option<Id>,
    /// Destination endpoint of a link, or `None` for a plain node.
    pub right: Option<Id>,
    /// The primitive's type, itself a primitive id.
    pub typeguid: Option<Id>,
    /// Opaque payload.
    pub payload: Value,
}

impl Primitive {
    /// Build the [`crate::PrimitiveSummary`] of the fields this single
    /// primitive pins — used when a leaf iterator reports what it locks
    /// down so the AND optimizer can reason about fusion and subsumption
    /// (spec.md §4.5.1 steps 3–5).
    pub fn fixed_summary(&self) -> crate::PrimitiveSummary {
        crate::PrimitiveSummary {
            typeguid: self.typeguid,
            left: self.left,
            right: self.right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_summary_mirrors_linkage_fields() {
        let p = Primitive {
            id: Id::new(1).unwrap(),
            left: Some(Id::new(2).unwrap()),
            right: None,
            typeguid: Some(Id::new(3).unwrap()),
            payload: Value(serde_json::Value::Null),
        };
        let s = p.fixed_summary();
        assert_eq!(s.typeguid, Some(Id::new(3).unwrap()));
        assert_eq!(s.left, Some(Id::new(2).unwrap()));
        assert_eq!(s.right, None);
    }
}
