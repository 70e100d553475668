//! The query cursor (spec.md §6 "Cursor (iterator freeze) format", §7
//! "Pagination").
//!
//! A [`Cursor`] owns the committed iterator tree `Database::query` built
//! and drives it a page at a time through `gravel_executor::page`. Its
//! [`Cursor::freeze`] is a thin pass-through to the underlying iterator's
//! own `freeze`; [`Cursor::thaw`] reconstructs a live cursor from that
//! string via `gravel_engine::thaw_any`, which covers every leaf producer
//! with an inverse and the standing `AndIterator` (checkers, check order,
//! and a cache resynced by replay — see that crate's own notes). The one
//! format with no inverse is `IdSetIterator`'s: it carries no backing
//! array data to rebuild from, so a frozen cursor built over one cannot
//! be thawed.

use gravel_core::id::Id;
use gravel_core::{Budget, Direction, Result};
use gravel_engine::{thaw_any, FreezeFlags, SetIterator};
use gravel_executor::{run_exhaustive, run_to_page, PageOutcome};

/// A live handle on one committed query's result set.
pub struct Cursor {
    it: Box<dyn SetIterator>,
    direction: Direction,
}

impl Cursor {
    pub(crate) fn new(it: Box<dyn SetIterator>, direction: Direction) -> Self {
        Cursor { it, direction }
    }

    /// Reconstruct a cursor from a string produced by [`Cursor::freeze`].
    /// Returns `None` if `frozen` has no inverse (see this module's doc
    /// comment) or is malformed.
    pub fn thaw(frozen: &str, direction: Direction, budget: &mut Budget) -> Option<Cursor> {
        let it = thaw_any(frozen, direction, budget)?;
        Some(Cursor { it, direction })
    }

    /// Direct access to the underlying iterator, for callers driving it
    /// through the raw `SetIterator` trait (tests, or operators that need
    /// `find`/`check` rather than paging).
    pub fn iterator_mut(&mut self) -> &mut dyn SetIterator {
        self.it.as_mut()
    }

    /// The direction this cursor walks in — needed to [`Cursor::thaw`] a
    /// string this cursor later freezes.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Drive this cursor for up to `pagesize` results.
    pub fn next_page(&mut self, pagesize: usize, budget: &mut Budget) -> Result<PageOutcome> {
        run_to_page(self.it.as_mut(), pagesize, budget)
    }

    /// Drive this cursor to completion, failing if the result set exceeds
    /// `pagesize * k` (spec.md §7 "Result set larger than `pagesize × k`").
    pub fn exhaustive(&mut self, pagesize: usize, k: usize, budget: &mut Budget) -> Result<PageOutcome> {
        run_exhaustive(self.it.as_mut(), pagesize, k, budget)
    }

    /// Position this cursor at the least id `>= id` (forward direction) or
    /// greatest id `<= id` (backward), without consuming a page.
    pub fn find(&mut self, id: Id, budget: &mut Budget) -> gravel_core::Step<Id> {
        self.it.find(id, budget)
    }

    /// Serialize this cursor's position for inspection or storage. Pass
    /// the result to [`Cursor::thaw`] (with this cursor's [`Cursor::direction`])
    /// to reconstruct it later.
    pub fn freeze(&self, flags: FreezeFlags) -> String {
        self.it.freeze(flags)
    }
}
