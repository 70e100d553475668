//! The ID-array accessor and intersect kernel (spec.md §4.2).
//!
//! This crate sits above `gravel_storage`'s physical partition formats
//! and below `gravel_engine`'s iterator algebra: it gives every leaf
//! iterator a single, representation-agnostic way to read a monotone id
//! sequence, regardless of whether that sequence lives inline, in a
//! bucket page, across a GMAP chain, or as a bitmap.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitmap;
pub mod error;
pub mod idarray;
pub mod intersect;

pub use bitmap::Bitmap;
pub use error::{PrimitivesError, Result};
pub use idarray::{IdArray, Representation};
pub use intersect::idarray_intersect;
