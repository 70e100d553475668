//! Sabotage/deadline delivery (spec.md §5 "Cancellation": "A request may
//! deliver a sabotage/deadline flag (checked at every budget test). A
//! cancelled call returns a `NeedMoreBudget`-equivalent state; the caller
//! then destroys the iterator tree").
//!
//! [`gravel_core::Budget`] already carries a [`gravel_core::CancelToken`]
//! for the flag itself; this module adds the deadline half (a wall-clock
//! limit that, once passed, behaves exactly like an explicit cancel) so
//! callers have one place to check both.

use gravel_core::CancelToken;
use std::time::{Duration, Instant};

/// Combines an explicit cancel flag with an optional wall-clock deadline.
/// `check` is meant to run alongside every `Budget::charge` call, per
/// spec.md's "checked at every budget test".
pub struct Sabotage {
    token: CancelToken,
    deadline: Option<Instant>,
}

impl Sabotage {
    /// No deadline, only explicit cancellation.
    pub fn new(token: CancelToken) -> Self {
        Sabotage {
            token,
            deadline: None,
        }
    }

    /// Also cancel once `timeout` elapses from now.
    pub fn with_deadline(token: CancelToken, timeout: Duration) -> Self {
        Sabotage {
            token,
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// `true` once the request should stop: either the token was
    /// cancelled or the deadline has passed. Passing the deadline also
    /// cancels the token, so every clone of the same iterator tree
    /// observes the stop uniformly from then on.
    pub fn check(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.token.cancel();
                return true;
            }
        }
        false
    }

    /// The underlying shared token, for handing to a [`gravel_core::Budget`].
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_cancel_is_observed() {
        let token = CancelToken::new();
        let sabotage = Sabotage::new(token.clone());
        assert!(!sabotage.check());
        token.cancel();
        assert!(sabotage.check());
    }

    #[test]
    fn deadline_cancels_once_elapsed() {
        let token = CancelToken::new();
        let sabotage = Sabotage::with_deadline(token.clone(), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(sabotage.check());
        assert!(token.is_cancelled());
    }

    #[test]
    fn no_deadline_never_times_out_on_its_own() {
        let token = CancelToken::new();
        let sabotage = Sabotage::new(token.clone());
        std::thread::sleep(Duration::from_millis(2));
        assert!(!sabotage.check());
    }
}
