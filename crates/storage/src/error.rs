//! Errors for the tile cache and partitioned store (spec.md §4.1
//! "Errors").

use thiserror::Error;

/// Errors raised by [`crate::tile::TileCache`] and the partition readers.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An on-disk invariant was violated: bad magic or an offset past
    /// EOF (spec.md §4.1).
    #[error("corrupt: {0}")]
    Corrupt(String),

    /// The referenced partition has not been opened.
    #[error("unknown partition {0:?}")]
    UnknownPartition(crate::tile::PartitionId),

    /// Durability layer failure surfaced through the tile cache's write
    /// path.
    #[error("durability error: {0}")]
    Durability(#[from] gravel_durability::DurabilityError),
}

impl From<StorageError> for gravel_core::Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(io) => gravel_core::Error::Io(io),
            StorageError::Corrupt(msg) => gravel_core::Error::Corrupt(msg),
            StorageError::UnknownPartition(p) => {
                gravel_core::Error::Semantic(format!("unknown partition {p:?}"))
            }
            StorageError::Durability(d) => d.into(),
        }
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, StorageError>;
