//! The error hierarchy (spec.md §6 "Error codes surfaced to callers", §7
//! "Error handling design").
//!
//! `EndOfSet` and `NeedMoreBudget` are deliberately *not* variants here —
//! spec.md §7 calls them normal terminal/suspension conditions, not
//! errors, and [`crate::Step`]/[`crate::Check`] carry them instead. This
//! type is for the other five kinds: `Already`, `Corrupt`, `Io`, plus the
//! user-visible failure codes a request ultimately surfaces.

use std::io;
use thiserror::Error;

/// Result alias used throughout the workspace for fallible operations
/// that are not themselves budget-driven iterator steps.
pub type Result<T> = std::result::Result<T, Error>;

/// The unified error type for the query execution core.
#[derive(Debug, Error)]
pub enum Error {
    /// An optimization or refresh had nothing to do (spec.md §7 kind 3).
    /// Not a failure; callers fall through.
    #[error("already up to date")]
    Already,

    /// An on-disk invariant was violated: bad magic, offset past EOF, or a
    /// checksum mismatch (spec.md §7 kind 4).
    #[error("corrupt: {0}")]
    Corrupt(String),

    /// Propagated unchanged from the OS or filesystem (spec.md §7 kind 5).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A cursor failed to parse (spec.md §6 "SYNTAX bad arguments").
    #[error("syntax: {0}")]
    Syntax(String),

    /// A well-formed request could not be satisfied for reasons other
    /// than the specific codes above (spec.md §6 "SEMANTICS <message>").
    #[error("semantics: {0}")]
    Semantic(String),

    /// A request resolved to zero results (spec.md §6 "EMPTY not found").
    #[error("empty: not found")]
    Empty,

    /// A request's result set exceeded `pagesize * k` (spec.md §6
    /// "TOOMANY too many matches").
    #[error("too many matches")]
    TooManyMatches,

    /// The entity referenced by a request already exists.
    #[error("already exists")]
    Existing,

    /// The entity referenced by a request does not exist.
    #[error("not found")]
    NotFound,
}

impl Error {
    /// `true` for [`Error::Corrupt`] — callers use this to decide whether
    /// local in-memory cache invalidation (spec.md §7 "local recovery
    /// attempts ... wipe of the affected in-memory cache") applies.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::Corrupt(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_detection() {
        assert!(Error::Corrupt("bad magic".into()).is_corrupt());
        assert!(!Error::Empty.is_corrupt());
    }

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
