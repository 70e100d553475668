//! Errors for the backup log and checkpoint horizon.

use thiserror::Error;

/// Errors raised by [`crate::backup_log::BackupLog`] and
/// [`crate::horizon::Checkpoint`].
#[derive(Debug, Error)]
pub enum DurabilityError {
    /// Underlying file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The backup log file's header or a record failed to validate
    /// (spec.md §4.1 "Errors": `Corrupt`).
    #[error("corrupt backup log: {0}")]
    Corrupt(String),

    /// `horizon_write_finish` was called with no matching
    /// `horizon_write_start`, or `start` was called with a horizon that
    /// does not advance.
    #[error("invalid horizon transition: {0}")]
    InvalidHorizon(String),
}

impl From<DurabilityError> for gravel_core::Error {
    fn from(e: DurabilityError) -> Self {
        match e {
            DurabilityError::Io(io) => gravel_core::Error::Io(io),
            DurabilityError::Corrupt(msg) => gravel_core::Error::Corrupt(msg),
            DurabilityError::InvalidHorizon(msg) => gravel_core::Error::Semantic(msg),
        }
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, DurabilityError>;
