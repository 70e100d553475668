//! Errors for the ID-array accessor (spec.md §4.2).

use thiserror::Error;

/// Errors raised while reading or intersecting id arrays.
#[derive(Debug, Error)]
pub enum PrimitivesError {
    /// An index, offset, or range fell outside the array's bounds.
    #[error("id array: index {0} out of bounds (len {1})")]
    OutOfBounds(u64, u64),

    /// A stored sequence was not monotone in its declared direction.
    #[error("id array: sequence not monotone at offset {0}")]
    NotMonotone(u64),

    /// Reading the backing GMAP chain failed.
    #[error("id array: storage error: {0}")]
    Storage(#[from] gravel_storage::StorageError),
}

impl From<PrimitivesError> for gravel_core::Error {
    fn from(e: PrimitivesError) -> Self {
        match e {
            PrimitivesError::OutOfBounds(off, len) => {
                gravel_core::Error::Semantic(format!("index {off} out of bounds (len {len})"))
            }
            PrimitivesError::NotMonotone(off) => {
                gravel_core::Error::Corrupt(format!("sequence not monotone at offset {off}"))
            }
            PrimitivesError::Storage(s) => s.into(),
        }
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, PrimitivesError>;
