//! The statistics contest (spec.md §4.5.2): a round-robin race among the
//! subiterators of an AND to decide which one becomes the cache producer
//! — the one actually driven forward by `next`/`find` while every other
//! subiterator is demoted to a checker.
//!
//! Competitors take turns under a per-turn budget slice that ratchets up
//! round over round, each trying to collect [`GOAL`] candidate ids.
//! After every round the `estimate` formula picks a leader and drops any
//! competitor whose cost so far already exceeds it — a competitor that
//! hits end-of-set mid-contest is a definite answer (its collected ids
//! are its entire, exact output) and wins outright.

use crate::iterator::SetIterator;
use gravel_core::id::Id;
use gravel_core::{Budget, Check, Step};

/// Candidate ids collected per competitor per round before it "reports
/// in" (spec.md §4.5.2 "GOAL").
pub const GOAL: usize = 5;

/// The starting per-turn budget slice cap; ratchets up by
/// [`MAX_TURN_GROWTH`] each round, capped at [`MAX_TURN_CEILING`]
/// (spec.md §4.5.2 "max_turn").
const INITIAL_MAX_TURN: i64 = 10;
const MAX_TURN_GROWTH: i64 = 10;
const MAX_TURN_CEILING: i64 = 10_000;

/// Additive constant used in the zero-ids-found branch of `estimate`
/// (spec.md §4.5.2), keeping a competitor that has found nothing yet
/// from estimating to exactly zero cost.
const ESTIMATE_CONST: u64 = 1;

/// Page-size stand-in used as `n_to_produce` for sorted competitors,
/// when the caller has no real pagination context (spec.md §4.5.2:
/// "contextual pagesize if sorted").
const DEFAULT_PAGE_SIZE: u64 = 100;

/// Ceiling on the number of contest rounds, independent of budget —
/// guards against a pathological producer that charges zero budget per
/// call from looping forever.
const MAX_ROUNDS: u32 = 64;

/// What the contest decided.
pub struct ContestOutcome {
    /// Index into the original producer slice of the winner.
    pub winner_idx: usize,
    /// The winner's own raced clone, already positioned past
    /// [`ContestOutcome::collected`] — this becomes the AND's cache
    /// producer directly, so none of the contest's work is redone.
    pub producer: Box<dyn SetIterator>,
    /// Ids the winner produced during the contest, not yet checked
    /// against the other subiterators.
    pub collected: Vec<Id>,
    /// Total budget spent driving the winner before it won.
    pub cost_so_far: i64,
    /// `true` if the winner was driven to `EndOfSet` during the contest,
    /// meaning `collected` is its complete, exact output.
    pub exhausted: bool,
}

struct Competitor {
    idx: usize,
    it: Box<dyn SetIterator>,
    collected: Vec<Id>,
    cost_so_far: i64,
    eof: bool,
}

impl Competitor {
    fn n_to_produce(&self, universe_size: u64) -> u64 {
        if self.it.stats().sorted {
            DEFAULT_PAGE_SIZE
        } else {
            universe_size.max(1)
        }
    }

    /// `estimate(sc)` from spec.md §4.5.2: a lower-is-better projection
    /// of how much budget this competitor needs to produce
    /// `n_to_produce` results, extrapolated from its contest rate so far.
    fn estimate(&self, universe_size: u64) -> u64 {
        let n_to_produce = self.n_to_produce(universe_size);
        let cost = self.cost_so_far.max(0) as u64;
        if self.collected.is_empty() {
            2 * cost.saturating_mul(n_to_produce) + ESTIMATE_CONST
        } else {
            cost.saturating_mul(n_to_produce) / self.collected.len() as u64
        }
    }
}

/// Run the contest over `producers`, none of which are mutated — each
/// competitor races a clone, and the winner's raced clone is handed back
/// as the promoted producer. `universe_size` is the AND's own tightened
/// range width, used as `n_to_produce` for competitors that are not
/// sorted (spec.md §4.5.2: "whole setsize").
pub fn select_winner(producers: &[Box<dyn SetIterator>], universe_size: u64, budget: &mut Budget) -> ContestOutcome {
    debug_assert!(!producers.is_empty());

    // Cheapest-eligibility-first contest order (spec.md §4.5.2
    // "Eligibility"/"Contest order"): easy-fast producers race before
    // anything whose cost profile is still a guess.
    let mut order: Vec<usize> = (0..producers.len()).collect();
    order.sort_by_key(|&i| {
        let s = producers[i].stats();
        (!s.is_easy_fast(), s.n.unwrap_or(u64::MAX))
    });

    let mut competitors: Vec<Competitor> = order
        .into_iter()
        .map(|i| Competitor {
            idx: i,
            it: producers[i].clone_box(),
            collected: Vec::new(),
            cost_so_far: 0,
            eof: false,
        })
        .collect();

    let mut max_turn = INITIAL_MAX_TURN;
    let mut rounds = 0u32;

    loop {
        rounds += 1;
        let n_competing = competitors.len() as i64;
        let slice = (budget.remaining().max(1) / n_competing).max(1).min(max_turn);

        for c in competitors.iter_mut() {
            if c.eof {
                continue;
            }
            let mut turn = Budget::new(slice);
            while c.collected.len() < GOAL {
                match c.it.next(&mut turn) {
                    Step::Ready(id) => c.collected.push(id),
                    Step::EndOfSet => {
                        c.eof = true;
                        break;
                    }
                    Step::NeedMoreBudget => break,
                }
            }
            let spent = (slice - turn.remaining()).max(0);
            c.cost_so_far += spent;
            budget.charge(spent);
        }

        // A competitor that ran out mid-contest is a definite answer
        // (spec.md §4.5.2 "EOF is a definite answer"): its full output
        // is already known, so it wins outright regardless of anyone
        // else's estimate.
        if let Some(pos) = competitors.iter().position(|c| c.eof) {
            let winner = competitors.remove(pos);
            return ContestOutcome {
                winner_idx: winner.idx,
                cost_so_far: winner.cost_so_far,
                collected: winner.collected,
                producer: winner.it,
                exhausted: true,
            };
        }

        if competitors.len() > 1 {
            let leader_estimate = competitors
                .iter()
                .map(|c| c.estimate(universe_size))
                .min()
                .unwrap_or(u64::MAX);

            competitors.retain(|c| (c.cost_so_far.max(0) as u64) <= leader_estimate);
        }

        max_turn = max_turn.saturating_mul(MAX_TURN_GROWTH).min(MAX_TURN_CEILING);

        if competitors.len() <= 1 || budget.is_exhausted() || rounds >= MAX_ROUNDS {
            break;
        }
    }

    let mut best_pos = 0usize;
    let mut best_estimate = u64::MAX;
    for (pos, c) in competitors.iter().enumerate() {
        let est = c.estimate(universe_size);
        if est < best_estimate {
            best_estimate = est;
            best_pos = pos;
        }
    }
    let winner = competitors.remove(best_pos);
    ContestOutcome {
        winner_idx: winner.idx,
        cost_so_far: winner.cost_so_far,
        collected: winner.collected,
        producer: winner.it,
        exhausted: winner.eof,
    }
}

/// Re-verify contest-collected candidates against the non-winner
/// subiterators (spec.md §4.5.2 "On completion", cache seeding): the
/// contest only measured the winner's own production rate, never
/// checked these ids against anyone else.
pub fn seed_cache(
    collected: &[Id],
    checkers: &mut [Box<dyn SetIterator>],
    check_order: &[usize],
    budget: &mut Budget,
) -> Vec<Id> {
    let mut seeded = Vec::with_capacity(collected.len());
    for &id in collected {
        let mut all_yes = true;
        for &idx in check_order {
            match checkers[idx].check(id, budget) {
                Check::Yes => {}
                Check::No => {
                    all_yes = false;
                    break;
                }
                Check::NeedMoreBudget => {
                    // Budget ran out verifying a seed candidate; drop it
                    // rather than risk seeding an unverified id. The
                    // producer has already moved past it, so it is lost
                    // from this traversal — an accepted cost given how
                    // small `GOAL` is relative to a real query budget.
                    return seeded;
                }
            }
        }
        if all_yes {
            seeded.push(id);
        }
    }
    seeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{AllIterator, FixedIterator};
    use gravel_core::id::IdRange;
    use gravel_core::Direction;

    fn id(n: u64) -> Id {
        Id::new(n).unwrap()
    }

    #[test]
    fn prefers_easy_fast_smallest_cardinality() {
        let small = FixedIterator::new(vec![id(1), id(2)], Direction::Forward);
        let big = AllIterator::new(IdRange { low: id(1), high: id(1_000_000) }, Direction::Forward);
        let producers: Vec<Box<dyn SetIterator>> = vec![Box::new(big), Box::new(small)];
        let mut budget = Budget::new(100_000);
        let outcome = select_winner(&producers, 1_000_000, &mut budget);
        assert_eq!(outcome.winner_idx, 1);
        assert!(outcome.exhausted);
        assert_eq!(outcome.collected, vec![id(1), id(2)]);
    }

    #[test]
    fn a_producer_that_exhausts_mid_contest_wins_outright() {
        let tiny = FixedIterator::new(vec![id(5)], Direction::Forward);
        let sorted_scan = AllIterator::new(IdRange { low: id(1), high: id(50) }, Direction::Forward);
        let producers: Vec<Box<dyn SetIterator>> = vec![Box::new(sorted_scan), Box::new(tiny)];
        let mut budget = Budget::new(10_000);
        let outcome = select_winner(&producers, 50, &mut budget);
        assert_eq!(outcome.winner_idx, 1);
        assert!(outcome.exhausted);
        assert_eq!(outcome.collected, vec![id(5)]);
    }

    #[test]
    fn single_producer_wins_without_a_round() {
        let only = FixedIterator::new(vec![id(1), id(2), id(3)], Direction::Forward);
        let producers: Vec<Box<dyn SetIterator>> = vec![Box::new(only)];
        let mut budget = Budget::new(1_000);
        let outcome = select_winner(&producers, 3, &mut budget);
        assert_eq!(outcome.winner_idx, 0);
        assert_eq!(outcome.collected, vec![id(1), id(2), id(3)]);
        assert!(outcome.exhausted);
    }
}
