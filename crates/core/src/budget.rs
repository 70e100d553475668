//! Cooperative work budgets.
//!
//! Every iterator operation deducts the work it performs from a
//! caller-supplied budget (spec.md §3 "Budget discipline", §5
//! "Suspension points"). The source this core is modeled on threads a raw
//! `SABOTAGE_DECL` macro through every budget test to support mid-call
//! cancellation; we fold that into the budget value itself (spec.md §9,
//! "Global sabotage flag") rather than carrying a second out-of-band flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A signed pool of abstract work units plus a cancellation bit.
///
/// `charge` is the only way to spend budget; it never lets the tracked
/// value go more negative than necessary to record "exhausted", so the
/// budget-fidelity property (spec.md §8: "deducts at most B, never more
/// than the actual work done") holds by construction as long as callers
/// pass the real cost of the work they did.
#[derive(Debug, Clone)]
pub struct Budget {
    remaining: i64,
    cancel: Arc<AtomicBool>,
}

impl Budget {
    /// A fresh budget with `units` of work available and no cancellation
    /// source attached.
    pub fn new(units: i64) -> Self {
        Budget {
            remaining: units,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A budget that shares a cancellation token with other budgets
    /// derived from the same request (spec.md §5 "Cancellation"). Calling
    /// [`CancelToken::cancel`] on the shared token will make every budget
    /// sharing it report exhausted on its next check, independent of how
    /// much numeric budget remains.
    pub fn with_token(units: i64, token: CancelToken) -> Self {
        Budget {
            remaining: units,
            cancel: token.0,
        }
    }

    /// Units of work still available. Negative once exhausted.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// `true` once `remaining < 0` or the shared token has been cancelled.
    pub fn is_exhausted(&self) -> bool {
        self.remaining < 0 || self.cancel.load(Ordering::Relaxed)
    }

    /// Spend `cost` units, returning whether the caller may still
    /// continue. Cost is always deducted in full even if it drives the
    /// budget negative — the negative remainder is what tells the next
    /// resumed call how much it overspent by, which callers use to decide
    /// how large a slice to request next round (spec.md §4.5.2
    /// "Round-robin").
    pub fn charge(&mut self, cost: i64) -> bool {
        self.remaining -= cost;
        !self.is_exhausted()
    }

    /// A token that can be used to cancel this budget, and any other
    /// budget derived from it via [`Budget::with_token`] or
    /// [`Budget::fork`], from outside the call that owns it.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken(self.cancel.clone())
    }

    /// Split off a child budget for a sub-operation (e.g. one competitor's
    /// per-turn slice in the AND contest, spec.md §4.5.2). The child
    /// shares this budget's cancellation token but has its own
    /// independent unit count.
    pub fn fork(&self, units: i64) -> Budget {
        Budget {
            remaining: units,
            cancel: self.cancel.clone(),
        }
    }
}

/// A handle that can cancel every [`Budget`] derived from the same
/// request (spec.md §5 "A request may deliver a sabotage/deadline flag").
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    /// Mark every budget sharing this token as exhausted.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// `true` if [`CancelToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_never_overstates_remaining() {
        let mut b = Budget::new(10);
        assert!(b.charge(4));
        assert_eq!(b.remaining(), 6);
        assert!(!b.charge(20));
        assert_eq!(b.remaining(), -14);
        assert!(b.is_exhausted());
    }

    #[test]
    fn shared_token_cancels_independent_budgets() {
        let token = CancelToken::new();
        let mut a = Budget::with_token(1_000_000, token.clone());
        let b = Budget::with_token(1_000_000, token.clone());
        assert!(!a.is_exhausted());
        token.cancel();
        assert!(a.is_exhausted());
        assert!(b.is_exhausted());
        // Cancellation wins even though numeric budget remains.
        assert!(!a.charge(1));
    }

    #[test]
    fn fork_shares_cancellation_not_units() {
        let parent = Budget::new(5);
        let mut child = parent.fork(1_000);
        assert_eq!(child.remaining(), 1_000);
        parent.cancel_token().cancel();
        assert!(child.is_exhausted());
        let _ = child.charge(0);
    }
}
