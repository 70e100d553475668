//! The set iterator trait (spec.md §4.3 "Iterator trait").
//!
//! Every primitive-set producer (full scan, VIP/linkage lookup, fixed
//! array) and every compositional operator (AND, sort) implements this
//! one polymorphic interface. Dynamic dispatch (`Box<dyn SetIterator>`)
//! is the natural Rust shape for the heterogeneous subiterator trees the
//! AND iterator builds, mirroring how the teacher's search/query layer
//! holds `Box<dyn ...>` trait objects for its own operator trees.

use gravel_core::id::Id;
use gravel_core::summary::PrimitiveSummary;
use gravel_core::{Budget, Check, Direction, Statistics, StatStep, Step};

/// What a structural `range_estimate` query returns: how tightly the
/// iterator's remaining output is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEstimate {
    /// Lowest id that could still be produced, if known.
    pub lo: Option<Id>,
    /// Highest id that could still be produced, if known.
    pub hi: Option<Id>,
    /// An upper bound on how many more ids could be produced.
    pub n_max: Option<u64>,
    /// Whether `n_max` is exact rather than an estimate.
    pub n_exact: bool,
}

impl RangeEstimate {
    /// The least informative possible estimate: "could be anything".
    pub fn unknown() -> Self {
        RangeEstimate {
            lo: None,
            hi: None,
            n_max: None,
            n_exact: false,
        }
    }
}

/// Outcome of [`SetIterator::restrict`].
#[derive(Debug)]
pub enum RestrictOutcome {
    /// The iterator was narrowed to conform to `psum`; here is the
    /// narrowed iterator.
    Narrowed(Box<dyn SetIterator>),
    /// `psum` was already implied; no change needed.
    Already,
    /// `psum` contradicts this iterator's own summary; the set is empty.
    NoneContradicts,
}

/// Which extra information `freeze` should embed in the cursor, beyond
/// the minimum needed to resume (spec.md §4.3 `freeze(flags)`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreezeFlags {
    /// Embed statistics fields even if they could be recomputed cheaply.
    pub include_statistics: bool,
}

/// A primitive-set producer or operator (spec.md §4.3).
///
/// Implementors are `Send` so an iterator tree built on one thread can be
/// handed to a worker thread driving a background fsync-adjacent task
/// (spec.md §5's helper-thread model) without extra synchronization.
pub trait SetIterator: std::fmt::Debug + Send {
    /// Produce the next id in the iterator's direction, or `EndOfSet`, or
    /// suspend with `NeedMoreBudget` if `budget` runs out first.
    fn next(&mut self, budget: &mut Budget) -> Step<Id>;

    /// Position at the least id `>= id` (forward) or greatest id `<= id`
    /// (backward); only valid on iterators whose `statistics().sorted` is
    /// true.
    fn find(&mut self, id: Id, budget: &mut Budget) -> Step<Id>;

    /// Test membership of `id` without changing position.
    fn check(&mut self, id: Id, budget: &mut Budget) -> Check;

    /// Compute this iterator's [`Statistics`], if not already known. A
    /// one-shot operation: once it returns `StatStep::Done`,
    /// [`SetIterator::stats`] is authoritative until the tree is
    /// restructured by `evolve`.
    fn statistics(&mut self, budget: &mut Budget) -> StatStep;

    /// The statistics computed so far (possibly still `Statistics::unknown()`
    /// if `statistics` has not completed).
    fn stats(&self) -> Statistics;

    /// Reposition at the start of the iteration, in this iterator's
    /// direction.
    fn reset(&mut self);

    /// This iterator's declared direction.
    fn direction(&self) -> Direction;

    /// Clone this iterator. Clones of the same original share its result
    /// cache (spec.md §4.4); leaf iterators with no cache simply clone
    /// their own state.
    fn clone_box(&self) -> Box<dyn SetIterator>;

    /// Serialize this iterator's position and shape into a cursor string
    /// (spec.md §6 "Cursor (iterator freeze) format").
    fn freeze(&self, flags: FreezeFlags) -> String;

    /// This iterator's current primitive summary (spec.md §4.5.1's psum
    /// fusion/subsumption machinery).
    fn primitive_summary(&self) -> PrimitiveSummary;

    /// A structural estimate of this iterator's remaining output.
    fn range_estimate(&self) -> RangeEstimate;

    /// `true` if this iterator is guaranteed to produce nothing in
    /// `[lo, hi)` without doing any further I/O. A conservative `false`
    /// is always a safe answer (spec.md §9 `and_beyond` default).
    fn beyond(&self, lo: Id, hi: Id) -> bool;

    /// Narrow this iterator so that its output also satisfies `psum`,
    /// without mutating it.
    fn restrict(&self, psum: PrimitiveSummary) -> RestrictOutcome;
}

/// Deep-clone the contents of a boxed iterator.
impl Clone for Box<dyn SetIterator> {
    fn clone(&self) -> Self {
        self.as_ref().clone_box()
    }
}
