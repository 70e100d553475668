//! Traversal direction.

/// The direction an iterator produces ids in (spec.md §3 "ID set").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Ascending id order.
    Forward,
    /// Descending id order.
    Backward,
}

impl Direction {
    /// The direction the in-order traversal of the opposite endpoint
    /// would take; useful for `find` semantics, which land on the
    /// opposite side of the target depending on direction (spec.md §4.3
    /// "Find semantics").
    pub fn reverse(self) -> Direction {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    /// `true` for [`Direction::Forward`].
    pub fn is_forward(self) -> bool {
        matches!(self, Direction::Forward)
    }
}
