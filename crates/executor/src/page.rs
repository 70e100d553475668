//! Drives a committed iterator tree to a page of results (spec.md §6
//! "Error codes surfaced to callers", §7 "User-visible failure").

use gravel_core::id::Id;
use gravel_core::{Budget, Error, Result, Step};
use gravel_engine::{FreezeFlags, SetIterator};

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Ids in this page, in the iterator's declared direction.
    pub ids: Vec<Id>,
    /// A cursor to resume from for the next page, or `None` if this page
    /// reached the end of the set.
    pub cursor: Option<String>,
}

/// Outcome of [`run_to_page`].
#[derive(Debug)]
pub enum PageOutcome {
    /// A page of results (possibly the last).
    Page(Page),
    /// Ran out of budget before filling a page; retry with the same
    /// iterator and fresh budget.
    Suspended,
}

/// Drive `it` for up to `pagesize` results.
///
/// Returns [`Error::Empty`] only when the page is empty *and* the
/// iterator has reached its end (spec.md §6 `EMPTY not found`) — a
/// suspended call never reports empty, since more might still come.
pub fn run_to_page(it: &mut dyn SetIterator, pagesize: usize, budget: &mut Budget) -> Result<PageOutcome> {
    let mut ids = Vec::with_capacity(pagesize);
    let cursor = loop {
        if ids.len() >= pagesize {
            break Some(it.freeze(FreezeFlags::default()));
        }
        match it.next(budget) {
            Step::Ready(id) => ids.push(id),
            Step::EndOfSet => break None,
            Step::NeedMoreBudget => return Ok(PageOutcome::Suspended),
        }
    };
    if ids.is_empty() && cursor.is_none() {
        return Err(Error::Empty);
    }
    Ok(PageOutcome::Page(Page { ids, cursor }))
}

/// Drive `it` to completion (ignoring paging), failing with
/// [`Error::TooManyMatches`] if more than `pagesize * k` results would
/// have to be collected (spec.md §7 "Result set larger than `pagesize ×
/// k`").
pub fn run_exhaustive(
    it: &mut dyn SetIterator,
    pagesize: usize,
    k: usize,
    budget: &mut Budget,
) -> Result<PageOutcome> {
    let cap = pagesize.saturating_mul(k);
    let mut ids = Vec::new();
    loop {
        match it.next(budget) {
            Step::Ready(id) => {
                ids.push(id);
                if ids.len() > cap {
                    return Err(Error::TooManyMatches);
                }
            }
            Step::EndOfSet => break,
            Step::NeedMoreBudget => return Ok(PageOutcome::Suspended),
        }
    }
    if ids.is_empty() {
        return Err(Error::Empty);
    }
    Ok(PageOutcome::Page(Page { ids, cursor: None }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravel_engine::leaf::FixedIterator;
    use gravel_core::Direction;

    fn ids(vals: &[u64]) -> Vec<Id> {
        vals.iter().map(|&v| Id::new(v).unwrap()).collect()
    }

    #[test]
    fn pages_split_a_long_result_set() {
        let mut it = FixedIterator::new(ids(&[1, 2, 3, 4, 5]), Direction::Forward);
        let mut budget = Budget::new(1_000);
        let page1 = match run_to_page(&mut it, 2, &mut budget).unwrap() {
            PageOutcome::Page(p) => p,
            PageOutcome::Suspended => panic!("unexpected suspension"),
        };
        assert_eq!(page1.ids, ids(&[1, 2]));
        assert!(page1.cursor.is_some());

        let page2 = match run_to_page(&mut it, 2, &mut budget).unwrap() {
            PageOutcome::Page(p) => p,
            PageOutcome::Suspended => panic!("unexpected suspension"),
        };
        assert_eq!(page2.ids, ids(&[3, 4]));

        let page3 = match run_to_page(&mut it, 2, &mut budget).unwrap() {
            PageOutcome::Page(p) => p,
            PageOutcome::Suspended => panic!("unexpected suspension"),
        };
        assert_eq!(page3.ids, ids(&[5]));
        assert!(page3.cursor.is_none());
    }

    #[test]
    fn empty_result_set_reports_empty_error() {
        let empty_ids: Vec<Id> = Vec::new();
        let mut it = FixedIterator::new(empty_ids, Direction::Forward);
        let mut budget = Budget::new(1_000);
        let err = run_to_page(&mut it, 10, &mut budget).unwrap_err();
        assert!(matches!(err, Error::Empty));
    }

    #[test]
    fn exhaustive_run_reports_too_many() {
        let mut it = FixedIterator::new(ids(&[1, 2, 3, 4, 5]), Direction::Forward);
        let mut budget = Budget::new(1_000);
        let err = run_exhaustive(&mut it, 2, 1, &mut budget).unwrap_err();
        assert!(matches!(err, Error::TooManyMatches));
    }
}
