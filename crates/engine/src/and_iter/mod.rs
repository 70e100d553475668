//! The AND iterator (spec.md §4.5): intersects a set of subiterators by
//! driving one "winner" forward as the cache producer and checking every
//! candidate it yields against the rest.

pub mod check_order;
pub mod contest;

use crate::cache::IteratorCache;
use crate::iterator::{FreezeFlags, RangeEstimate, RestrictOutcome, SetIterator};
use crate::leaf::{self, FixedIterator, NullIterator};
use gravel_core::id::{Id, IdRange};
use gravel_core::summary::PrimitiveSummary;
use gravel_core::{Budget, Check, Direction, Statistics, StatStep, Step};
use parking_lot::Mutex;
use std::sync::Arc;

/// Cardinality at or below which `commit` materializes the result eagerly
/// instead of building a standing AND (spec.md §4.5.1 step 6, "small-set
/// pre-evaluation").
pub const SMALL_SET_THRESHOLD: u64 = 64;

/// State shared by every clone of one AND original (spec.md §4.5.5): the
/// result cache, the single cache producer that grows it, and the
/// canonical checker set/order/version a stale clone refreshes from
/// after `evolve` restructures the tree (spec.md §4.5.6/§3 "clone
/// invariant").
struct OriginalState {
    cache: IteratorCache,
    cache_producer: Box<dyn SetIterator>,
    producer_done: bool,
    structural_id: u64,
    checkers_template: Vec<Box<dyn SetIterator>>,
    check_order_template: Vec<usize>,
}

/// The outcome of [`commit`]: either the optimizer resolved to a concrete
/// iterator, or it ran out of budget mid-optimization and hands the
/// subiterators back untouched for a retry with fresh budget.
pub enum CommitOutcome {
    /// Optimization finished; this is the iterator to use.
    Resolved(Box<dyn SetIterator>),
    /// Ran out of budget while driving subiterator `statistics`; retry
    /// `commit` with the same subiterators and a fresh budget.
    Suspended(Vec<Box<dyn SetIterator>>),
}

/// Run the AND optimizer over `subiterators` (spec.md §4.5.1):
/// 1. Drive every subiterator's `statistics` to completion.
/// 2. NULL propagation: any empty subiterator makes the whole AND empty.
/// 3. PSUM subsumption: drop subiterators whose primitive summary is
///    already implied by another's.
/// 4. Range tightening via `range_estimate` intersection.
/// 5. Contest: pick the cache producer (spec.md §4.5.2).
/// 6. Small-set pre-evaluation: materialize eagerly if the winner's
///    cardinality is at or below [`SMALL_SET_THRESHOLD`].
/// 7. Otherwise build a standing [`AndIterator`] with the rest as
///    cost-ordered checkers, seed its cache with the contest's own
///    output, and run one `evolve` pass before handing it back.
///
/// VIP combination (spec.md step 3) and improve-on-ALL (step 5) are not
/// modeled here: both require a field-linkage lookup layer this crate
/// does not own, so they are left for the layer that builds subiterators
/// from typed constraints (`gravel-executor`) to apply before calling
/// `commit`.
pub fn commit(
    mut subiterators: Vec<Box<dyn SetIterator>>,
    direction: Direction,
    budget: &mut Budget,
) -> CommitOutcome {
    for p in subiterators.iter_mut() {
        loop {
            match p.statistics(budget) {
                StatStep::Done => break,
                StatStep::NeedMoreBudget => return CommitOutcome::Suspended(subiterators),
            }
        }
    }

    if subiterators.is_empty() || subiterators.iter().any(|p| p.stats().n == Some(0)) {
        return CommitOutcome::Resolved(Box::new(NullIterator::new(direction)));
    }

    let mut range = IdRange::full();
    for p in &subiterators {
        let est = p.range_estimate();
        if let Some(lo) = est.lo {
            range.low = range.low.max(lo);
        }
        if let Some(hi) = est.hi {
            if let Some(hi_excl) = hi.next() {
                range.high = range.high.min(hi_excl);
            }
        }
    }
    if range.is_empty() {
        return CommitOutcome::Resolved(Box::new(NullIterator::new(direction)));
    }

    let mut keep = vec![true; subiterators.len()];
    for i in 0..subiterators.len() {
        for j in 0..subiterators.len() {
            if i == j || !keep[i] {
                continue;
            }
            let si = subiterators[i].primitive_summary();
            let sj = subiterators[j].primitive_summary();
            if si != sj && si.subsumes(&sj) {
                keep[i] = false;
            }
        }
    }
    let subiterators: Vec<_> = subiterators
        .into_iter()
        .zip(keep)
        .filter(|(_, k)| *k)
        .map(|(p, _)| p)
        .collect();

    if subiterators.len() == 1 {
        return CommitOutcome::Resolved(subiterators.into_iter().next().unwrap());
    }

    let universe_size = range.high.get().saturating_sub(range.low.get()).max(1);
    let outcome = contest::select_winner(&subiterators, universe_size, budget);

    if !outcome.exhausted {
        if let Some(n) = subiterators[outcome.winner_idx].stats().n {
            if n <= SMALL_SET_THRESHOLD {
                if let Some(resolved) = try_pre_evaluate(&subiterators, outcome.winner_idx, direction, budget) {
                    return CommitOutcome::Resolved(resolved);
                }
            }
        }
    }

    let winner_stats = subiterators[outcome.winner_idx].stats();
    let mut subiterators = subiterators;
    subiterators.remove(outcome.winner_idx);
    let mut checkers = subiterators;
    let check_order = check_order::order_by_cost(&checkers);

    // spec.md §4.5.2 "On completion": the ids the contest collected were
    // only ever measured for cost, never checked against the rest of the
    // tree — verify them now so the cache only ever holds confirmed
    // members.
    let seeded = contest::seed_cache(&outcome.collected, &mut checkers, &check_order, budget);
    let mut cache = IteratorCache::new();
    for id in seeded {
        cache.add(id, 1);
    }
    if outcome.exhausted {
        cache.mark_eof();
    }

    let derived = derive_stats(
        direction,
        range,
        &checkers,
        &check_order,
        winner_stats,
        outcome.cost_so_far,
        outcome.collected.len() as u64,
    );

    let shared = Arc::new(Mutex::new(OriginalState {
        cache,
        cache_producer: outcome.producer,
        producer_done: outcome.exhausted,
        structural_id: 0,
        checkers_template: checkers.iter().map(|c| c.clone_box()).collect(),
        check_order_template: check_order.clone(),
    }));

    let mut it = AndIterator {
        shared,
        checkers,
        check_order,
        cache_offset: 0,
        direction,
        structural_id: 0,
        range,
        derived,
    };
    it.evolve();

    CommitOutcome::Resolved(Box::new(it))
}

/// Drain the winner and check every candidate against the rest, up
/// front. Returns `None` (falling back to a standing [`AndIterator`]) if
/// budget runs out partway through — small-set pre-evaluation is an
/// optimization, not a requirement.
fn try_pre_evaluate(
    subiterators: &[Box<dyn SetIterator>],
    winner_idx: usize,
    direction: Direction,
    budget: &mut Budget,
) -> Option<Box<dyn SetIterator>> {
    let mut winner = subiterators[winner_idx].clone_box();
    let mut matched = Vec::new();
    loop {
        match winner.next(budget) {
            Step::Ready(id) => {
                let mut all_yes = true;
                for (i, checker) in subiterators.iter().enumerate() {
                    if i == winner_idx {
                        continue;
                    }
                    let mut checker = checker.clone_box();
                    match checker.check(id, budget) {
                        Check::Yes => {}
                        Check::No => {
                            all_yes = false;
                            break;
                        }
                        Check::NeedMoreBudget => return None,
                    }
                }
                if all_yes {
                    matched.push(id);
                }
            }
            Step::EndOfSet => break,
            Step::NeedMoreBudget => return None,
        }
    }
    Some(Box::new(FixedIterator::new(matched, direction)))
}

/// Derive the AND's own `Statistics` from the winner and the surviving
/// checkers (spec.md §4.5.2 "On completion"). `cost_so_far`/`ids_found`
/// are the contest's own measurements; both are `0` when there was no
/// contest to measure from (post-thaw reconstruction), in which case
/// `next_cost` falls back to the winner's own pre-contest cost.
fn derive_stats(
    direction: Direction,
    range: IdRange,
    checkers: &[Box<dyn SetIterator>],
    check_order: &[usize],
    winner_stats: Statistics,
    cost_so_far: i64,
    ids_found: u64,
) -> Statistics {
    let universe = range.high.get().saturating_sub(range.low.get()).max(1);

    // Every leaf iterator in this crate completes `statistics` with an
    // exact `n` in one call, so the spec's "projected estimate clipped
    // to upper_bound/min-sub-n" collapses to an exact bound here: the
    // smallest `n` among the winner and every surviving checker.
    let min_sub_n = checkers
        .iter()
        .map(|c| c.stats().n.unwrap_or(u64::MAX))
        .chain(std::iter::once(winner_stats.n.unwrap_or(u64::MAX)))
        .min()
        .unwrap_or(u64::MAX);
    let n = (min_sub_n != u64::MAX).then(|| min_sub_n.min(universe));

    let next_cost = if ids_found > 0 {
        ((cost_so_far.max(0) as u64) / ids_found).max(1) as u32
    } else {
        winner_stats.next_cost.max(1)
    };

    // check_cost = Σ_i cc_i · Π_{j<i} chance_j, chance_i = n_i / universe
    // (spec.md §4.5.2), plus the AND's own per-call overhead.
    let mut check_cost_acc: f64 = 1.0;
    let mut chance_so_far: f64 = 1.0;
    let universe_f = universe as f64;
    for &idx in check_order {
        let cs = checkers[idx].stats();
        check_cost_acc += cs.check_cost as f64 * chance_so_far;
        let n_i = cs.n.unwrap_or(universe).min(universe) as f64;
        chance_so_far *= (n_i / universe_f).clamp(0.0, 1.0);
    }
    let check_cost = check_cost_acc.min(u32::MAX as f64) as u32;

    let find_cost = winner_stats.find_cost.saturating_add(next_cost);

    Statistics {
        n,
        check_cost,
        next_cost,
        find_cost,
        sorted: winner_stats.sorted,
        ordered: winner_stats.ordered,
        ordering: winner_stats.ordering.or(Some(direction)),
        done: true,
    }
}

/// A standing intersection of subiterators, one of which (the cache
/// producer) is driven forward on demand; the rest only ever answer
/// `check` (spec.md §4.5.4).
pub struct AndIterator {
    shared: Arc<Mutex<OriginalState>>,
    checkers: Vec<Box<dyn SetIterator>>,
    check_order: Vec<usize>,
    cache_offset: usize,
    direction: Direction,
    structural_id: u64,
    range: IdRange,
    derived: Statistics,
}

impl std::fmt::Debug for AndIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AndIterator")
            .field("checkers", &self.checkers.len())
            .field("cache_offset", &self.cache_offset)
            .field("direction", &self.direction)
            .field("structural_id", &self.structural_id)
            .finish()
    }
}

impl AndIterator {
    /// Drive the shared cache producer forward until it yields a
    /// candidate that passes every checker (appended to the cache), the
    /// producer is exhausted, or budget runs out.
    fn grow_cache(&mut self, budget: &mut Budget) -> Step<()> {
        let mut shared = self.shared.lock();
        loop {
            if shared.producer_done {
                return Step::EndOfSet;
            }
            match shared.cache_producer.next(budget) {
                Step::NeedMoreBudget => return Step::NeedMoreBudget,
                Step::EndOfSet => {
                    shared.producer_done = true;
                    shared.cache.mark_eof();
                    return Step::EndOfSet;
                }
                Step::Ready(id) => {
                    let mut all_yes = true;
                    for &idx in &self.check_order {
                        match self.checkers[idx].check(id, budget) {
                            Check::Yes => {}
                            Check::No => {
                                all_yes = false;
                                break;
                            }
                            Check::NeedMoreBudget => return Step::NeedMoreBudget,
                        }
                    }
                    if all_yes {
                        shared.cache.add(id, 1);
                        return Step::Ready(());
                    }
                }
            }
        }
    }

    /// Pull in whatever canonical checker set/order `evolve` has since
    /// published, if this clone's `structural_id` has fallen behind
    /// (spec.md §3 "clone invariant": valid only while
    /// `clone.structural_id == original.structural_id`, otherwise
    /// refresh).
    fn refresh_if_stale(&mut self) {
        let shared = self.shared.lock();
        if shared.structural_id != self.structural_id {
            self.checkers = shared.checkers_template.iter().map(|c| c.clone_box()).collect();
            self.check_order = shared.check_order_template.clone();
            self.structural_id = shared.structural_id;
        }
    }

    /// Re-run the post-contest cleanup (spec.md §4.5.6 "Evolve"): drop
    /// any surviving checker that can never reject a candidate once
    /// statistics are known (a full, unconstrained scan over at least
    /// this AND's own tightened range — the leftover `ALL` the contest
    /// didn't pick), refresh the check ordering, and recompute derived
    /// statistics. Bumps `structural_id` and publishes the new canonical
    /// checker set if anything actually changed, so existing clones
    /// refresh on their next call. Returns whether anything changed.
    pub fn evolve(&mut self) -> bool {
        self.refresh_if_stale();

        let covers_range = |c: &Box<dyn SetIterator>| -> bool {
            if c.primitive_summary() != PrimitiveSummary::unconstrained() {
                return false;
            }
            let est = c.range_estimate();
            if !est.n_exact {
                return false;
            }
            let top = self.range.high.prev().unwrap_or(self.range.high);
            est.lo.map_or(true, |lo| lo <= self.range.low) && est.hi.map_or(true, |hi| hi >= top)
        };

        let keep: Vec<bool> = self.checkers.iter().map(|c| !covers_range(c)).collect();
        let dropped_any = keep.iter().any(|k| !k);

        if dropped_any {
            let mut i = 0;
            self.checkers.retain(|_| {
                let k = keep[i];
                i += 1;
                k
            });
            self.check_order = check_order::order_by_cost(&self.checkers);

            let mut shared = self.shared.lock();
            shared.structural_id += 1;
            shared.checkers_template = self.checkers.iter().map(|c| c.clone_box()).collect();
            shared.check_order_template = self.check_order.clone();
            self.structural_id = shared.structural_id;
        }

        if dropped_any {
            let winner_stats = {
                let shared = self.shared.lock();
                shared.cache_producer.stats()
            };
            self.derived = derive_stats(
                self.direction,
                self.range,
                &self.checkers,
                &self.check_order,
                winner_stats,
                0,
                0,
            );
        }

        dropped_any
    }
}

impl SetIterator for AndIterator {
    fn next(&mut self, budget: &mut Budget) -> Step<Id> {
        self.refresh_if_stale();
        loop {
            {
                let shared = self.shared.lock();
                if let Some(id) = shared.entry_id_at(self.cache_offset) {
                    drop(shared);
                    self.cache_offset += 1;
                    return Step::Ready(id);
                }
            }
            match self.grow_cache(budget) {
                Step::Ready(()) => continue,
                Step::EndOfSet => return Step::EndOfSet,
                Step::NeedMoreBudget => return Step::NeedMoreBudget,
            }
        }
    }

    fn find(&mut self, id: Id, budget: &mut Budget) -> Step<Id> {
        loop {
            match self.next(budget) {
                Step::Ready(x) => {
                    let reached = match self.direction {
                        Direction::Forward => x >= id,
                        Direction::Backward => x <= id,
                    };
                    if reached {
                        return Step::Ready(x);
                    }
                }
                other => return other,
            }
        }
    }

    fn check(&mut self, id: Id, budget: &mut Budget) -> Check {
        self.refresh_if_stale();
        {
            let shared = self.shared.lock();
            if shared.cache.search(id).is_ok() {
                return Check::Yes;
            }
        }
        let producer_answer = {
            let mut shared = self.shared.lock();
            shared.cache_producer.check(id, budget)
        };
        match producer_answer {
            Check::No => return Check::No,
            Check::NeedMoreBudget => return Check::NeedMoreBudget,
            Check::Yes => {}
        }
        for &idx in &self.check_order {
            match self.checkers[idx].check(id, budget) {
                Check::Yes => {}
                Check::No => return Check::No,
                Check::NeedMoreBudget => return Check::NeedMoreBudget,
            }
        }
        Check::Yes
    }

    fn statistics(&mut self, _budget: &mut Budget) -> StatStep {
        StatStep::Done
    }

    fn stats(&self) -> Statistics {
        self.derived
    }

    fn reset(&mut self) {
        self.cache_offset = 0;
        for c in self.checkers.iter_mut() {
            c.reset();
        }
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn clone_box(&self) -> Box<dyn SetIterator> {
        Box::new(AndIterator {
            shared: self.shared.clone(),
            checkers: self.checkers.iter().map(|c| c.clone_box()).collect(),
            check_order: self.check_order.clone(),
            cache_offset: self.cache_offset,
            direction: self.direction,
            structural_id: self.structural_id,
            range: self.range,
            derived: self.derived,
        })
    }

    fn freeze(&self, flags: FreezeFlags) -> String {
        let producer_freeze = {
            let shared = self.shared.lock();
            shared.cache_producer.freeze(flags)
        };
        let mut out = String::from("and:");
        push_chunk(&mut out, &producer_freeze);
        out.push_str(&self.checkers.len().to_string());
        out.push(':');
        for c in &self.checkers {
            push_chunk(&mut out, &c.freeze(flags));
        }
        let order_csv = self.check_order.iter().map(usize::to_string).collect::<Vec<_>>().join(",");
        push_chunk(&mut out, &order_csv);
        out.push_str(&self.cache_offset.to_string());
        out.push(':');
        out.push_str(&self.structural_id.to_string());
        out
    }

    fn primitive_summary(&self) -> PrimitiveSummary {
        let shared = self.shared.lock();
        let mut summary = shared.cache_producer.primitive_summary();
        for c in &self.checkers {
            if let Some(merged) = summary.merge(&c.primitive_summary()) {
                summary = merged;
            }
        }
        summary
    }

    fn range_estimate(&self) -> RangeEstimate {
        RangeEstimate::unknown()
    }

    fn beyond(&self, _lo: Id, _hi: Id) -> bool {
        // Conservative default (spec.md §9 `and_beyond`): clones without
        // up-to-date cache-tail context always answer `false` rather than
        // risk a false "definitely nothing here".
        false
    }

    fn restrict(&self, _psum: PrimitiveSummary) -> RestrictOutcome {
        RestrictOutcome::Already
    }
}

impl OriginalState {
    fn entry_id_at(&self, offset: usize) -> Option<Id> {
        self.cache.index(offset)
    }
}

fn push_chunk(out: &mut String, s: &str) {
    out.push_str(&s.len().to_string());
    out.push(':');
    out.push_str(s);
    out.push(':');
}

struct Reader<'a> {
    s: &'a str,
}

impl<'a> Reader<'a> {
    fn new(s: &'a str) -> Self {
        Reader { s }
    }

    fn take_field(&mut self) -> Option<&'a str> {
        let (field, rest) = self.s.split_once(':')?;
        self.s = rest;
        Some(field)
    }

    fn take_usize(&mut self) -> Option<usize> {
        self.take_field()?.parse().ok()
    }

    fn take_chunk(&mut self) -> Option<String> {
        let len = self.take_usize()?;
        if self.s.len() < len {
            return None;
        }
        let (chunk, rest) = self.s.split_at(len);
        self.s = rest.strip_prefix(':')?;
        Some(chunk.to_string())
    }
}

/// Reconstruct any leaf or AND iterator from a [`SetIterator::freeze`]
/// string (spec.md §4.5.7 "Freeze/thaw"). Returns `None` for formats
/// with no inverse — an [`crate::leaf::IdSetIterator`]'s freeze carries
/// no backing array data to rebuild from, spec.md defines no wire format
/// for one — and for anything unrecognized.
pub fn thaw_any(s: &str, direction: Direction, budget: &mut Budget) -> Option<Box<dyn SetIterator>> {
    if s == "null[]" {
        Some(Box::new(NullIterator::new(direction)))
    } else if s.starts_with("fixed[") {
        leaf::fixed::thaw(s, direction).map(|it| Box::new(it) as Box<dyn SetIterator>)
    } else if s.starts_with("all[") {
        leaf::all::thaw(s, direction).map(|it| Box::new(it) as Box<dyn SetIterator>)
    } else if s.starts_with("and:") {
        thaw(s, direction, budget)
    } else {
        None
    }
}

/// Reconstruct an [`AndIterator`] from the body produced by its own
/// `freeze` (spec.md §4.5.7): rebuild the producer and checkers, then
/// resync the shared cache by replaying production up to the frozen
/// `cache_offset`. This never re-runs the contest — the deserialized
/// producer simply is the winner, the same effect spec.md's
/// `gia_producer_hint` has on a fresh `commit` — so `stats()` on the
/// result falls back to the producer's own pre-contest costs rather than
/// a freshly measured rate.
pub fn thaw(body: &str, direction: Direction, budget: &mut Budget) -> Option<Box<dyn SetIterator>> {
    let rest = body.strip_prefix("and:")?;
    let mut r = Reader::new(rest);

    let producer_str = r.take_chunk()?;
    let n_checkers = r.take_usize()?;
    let mut checker_strs = Vec::with_capacity(n_checkers);
    for _ in 0..n_checkers {
        checker_strs.push(r.take_chunk()?);
    }
    let order_csv = r.take_chunk()?;
    let cache_offset = r.take_usize()?;
    let structural_id: u64 = r.s.parse().ok()?;

    let mut producer = thaw_any(&producer_str, direction, budget)?;
    // The producer's own encoded position is not enough on its own: the
    // shared cache it fed may hold more entries than this one clone's
    // `cache_offset` (other clones, or contest seeding, can run it
    // ahead). Rewind it and replay from scratch instead — `check` is
    // stateless on every iterator in this crate, so the replay below
    // reproduces the exact same cache deterministically.
    producer.reset();
    let mut checkers: Vec<Box<dyn SetIterator>> = Vec::with_capacity(checker_strs.len());
    for cs in &checker_strs {
        checkers.push(thaw_any(cs, direction, budget)?);
    }
    let check_order: Vec<usize> = if order_csv.is_empty() {
        Vec::new()
    } else {
        order_csv.split(',').map(|x| x.parse().ok()).collect::<Option<Vec<_>>>()?
    };

    loop {
        match producer.statistics(budget) {
            StatStep::Done => break,
            StatStep::NeedMoreBudget => return None,
        }
    }
    for c in checkers.iter_mut() {
        loop {
            match c.statistics(budget) {
                StatStep::Done => break,
                StatStep::NeedMoreBudget => return None,
            }
        }
    }

    let mut cache = IteratorCache::new();
    let mut produced = 0usize;
    let mut producer_done = false;
    while produced < cache_offset {
        match producer.next(budget) {
            Step::Ready(id) => {
                let mut all_yes = true;
                for &idx in &check_order {
                    match checkers[idx].check(id, budget) {
                        Check::Yes => {}
                        Check::No => {
                            all_yes = false;
                            break;
                        }
                        Check::NeedMoreBudget => return None,
                    }
                }
                if all_yes {
                    cache.add(id, 1);
                    produced += 1;
                }
            }
            Step::EndOfSet => {
                producer_done = true;
                cache.mark_eof();
                break;
            }
            Step::NeedMoreBudget => return None,
        }
    }

    let mut range = IdRange::full();
    let estimates: Vec<RangeEstimate> = checkers
        .iter()
        .map(|c| c.range_estimate())
        .chain(std::iter::once(producer.range_estimate()))
        .collect();
    for est in estimates {
        if let Some(lo) = est.lo {
            range.low = range.low.max(lo);
        }
        if let Some(hi) = est.hi {
            if let Some(hi_excl) = hi.next() {
                range.high = range.high.min(hi_excl);
            }
        }
    }

    let winner_stats = producer.stats();
    let derived = derive_stats(direction, range, &checkers, &check_order, winner_stats, 0, 0);

    let shared = Arc::new(Mutex::new(OriginalState {
        cache,
        cache_producer: producer,
        producer_done,
        structural_id,
        checkers_template: checkers.iter().map(|c| c.clone_box()).collect(),
        check_order_template: check_order.clone(),
    }));

    Some(Box::new(AndIterator {
        shared,
        checkers,
        check_order,
        cache_offset,
        direction,
        structural_id,
        range,
        derived,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{AllIterator, FixedIterator, IdSetIterator};
    use gravel_primitives::IdArray;
    use std::sync::Arc as StdArc;

    fn id(n: u64) -> Id {
        Id::new(n).unwrap()
    }

    #[test]
    fn intersects_two_sorted_sets() {
        let a = FixedIterator::new(vec![id(1), id(2), id(3), id(4)], Direction::Forward);
        let b = FixedIterator::new(vec![id(2), id(4), id(6)], Direction::Forward);
        let mut budget = Budget::new(10_000);
        let outcome = commit(vec![Box::new(a), Box::new(b)], Direction::Forward, &mut budget);
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
        assert_eq!(out, vec![2, 4]);
    }

    #[test]
    fn any_empty_subiterator_makes_the_and_null() {
        let a = FixedIterator::new(vec![id(1), id(2)], Direction::Forward);
        let empty: Vec<Id> = Vec::new();
        let b = FixedIterator::new(empty, Direction::Forward);
        let mut budget = Budget::new(10_000);
        let outcome = commit(vec![Box::new(a), Box::new(b)], Direction::Forward, &mut budget);
        let mut it = match outcome {
            CommitOutcome::Resolved(it) => it,
            CommitOutcome::Suspended(_) => panic!("unexpected suspension"),
        };
        assert_eq!(it.next(&mut budget), Step::EndOfSet);
    }

    #[test]
    fn scan_and_sparse_lookup_intersect() {
        let full = AllIterator::new(IdRange { low: id(1), high: id(1_000) }, Direction::Forward);
        let sparse_ids: Vec<Id> = (1u64..1_000).filter(|n| n % 7 == 0).map(id).collect();
        let arr = StdArc::new(IdArray::bucket(sparse_ids, Direction::Forward).unwrap());
        let sparse = IdSetIterator::new(arr, PrimitiveSummary::unconstrained());
        let mut budget = Budget::new(100_000);
        let outcome = commit(vec![Box::new(full), Box::new(sparse)], Direction::Forward, &mut budget);
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
        let expected: Vec<u64> = (1u64..1_000).filter(|n| n % 7 == 0).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn find_skips_forward_to_first_match() {
        let a = FixedIterator::new(vec![id(1), id(2), id(3), id(4), id(5)], Direction::Forward);
        let b = FixedIterator::new(vec![id(2), id(4)], Direction::Forward);
        let mut budget = Budget::new(10_000);
        let outcome = commit(vec![Box::new(a), Box::new(b)], Direction::Forward, &mut budget);
        let mut it = match outcome {
            CommitOutcome::Resolved(it) => it,
            CommitOutcome::Suspended(_) => panic!("unexpected suspension"),
        };
        assert_eq!(it.find(id(3), &mut budget), Step::Ready(id(4)));
    }

    #[test]
    fn stats_are_derived_from_the_winner_not_hand_picked() {
        // Cardinality above `SMALL_SET_THRESHOLD` on both sides, so the
        // contest's winner is never eagerly pre-evaluated into a concrete
        // `FixedIterator` — this is the only way to check `stats()` on an
        // actual standing `AndIterator`.
        let evens: Vec<Id> = (1..=80).map(|n| id(2 * n)).collect();
        let a = FixedIterator::new(evens, Direction::Forward);
        let b = AllIterator::new(IdRange { low: id(1), high: id(300) }, Direction::Forward);
        let mut budget = Budget::new(1_000_000);
        let outcome = commit(vec![Box::new(a), Box::new(b)], Direction::Forward, &mut budget);
        let it = match outcome {
            CommitOutcome::Resolved(it) => it,
            CommitOutcome::Suspended(_) => panic!("unexpected suspension"),
        };
        let stats = it.stats();
        assert!(stats.done);
        assert!(stats.n.is_some());
        assert!(stats.n.unwrap() <= 80);
        assert!(stats.next_cost > 0);
        assert!(stats.find_cost > 0);
    }

    #[test]
    fn freeze_then_thaw_resumes_from_the_same_position() {
        // Both subiterators must have cardinality above `SMALL_SET_THRESHOLD`
        // so the contest's winner is never eagerly materialized — this is
        // the only way to actually exercise a standing `AndIterator`'s
        // `freeze`/`thaw`, rather than a leaf's.
        let evens: Vec<Id> = (1..=80).map(|n| id(2 * n)).collect();
        let a = FixedIterator::new(evens.clone(), Direction::Forward);
        let b = AllIterator::new(IdRange { low: id(1), high: id(300) }, Direction::Forward);
        let mut budget = Budget::new(1_000_000);
        let outcome = commit(vec![Box::new(a), Box::new(b)], Direction::Forward, &mut budget);
        let mut it = match outcome {
            CommitOutcome::Resolved(it) => it,
            CommitOutcome::Suspended(_) => panic!("unexpected suspension"),
        };

        assert_eq!(it.next(&mut budget), Step::Ready(id(2)));
        assert_eq!(it.next(&mut budget), Step::Ready(id(4)));

        let frozen = it.freeze(FreezeFlags::default());
        let mut thawed = thaw_any(&frozen, Direction::Forward, &mut budget).expect("freeze string should thaw");

        let mut rest = Vec::new();
        loop {
            match thawed.next(&mut budget) {
                Step::Ready(x) => rest.push(x.get()),
                Step::EndOfSet => break,
                Step::NeedMoreBudget => panic!("unexpected suspension"),
            }
        }
        let expected: Vec<u64> = evens.iter().skip(2).map(|x| x.get()).collect();
        assert_eq!(rest, expected);
    }

    #[test]
    fn evolve_drops_a_leftover_all_checker_and_bumps_structural_id() {
        let sparse = FixedIterator::new(vec![id(2), id(4), id(6)], Direction::Forward);
        let scan = AllIterator::new(IdRange { low: id(1), high: id(10) }, Direction::Forward);
        let mut budget = Budget::new(100_000);
        let outcome = commit(vec![Box::new(sparse), Box::new(scan)], Direction::Forward, &mut budget);
        let it = match outcome {
            CommitOutcome::Resolved(it) => it,
            CommitOutcome::Suspended(_) => panic!("unexpected suspension"),
        };
        // commit() already ran one evolve pass; the leftover full-range
        // scan should have been dropped, bumping structural_id past 0,
        // and its freeze (the only "all[" producer in this tree) should
        // no longer appear among the checkers.
        let frozen = it.freeze(FreezeFlags::default());
        assert!(frozen.ends_with(":1"), "expected structural_id 1 in {frozen}");
        assert!(!frozen.contains("all["), "expected the leftover scan checker to be gone: {frozen}");
    }
}
