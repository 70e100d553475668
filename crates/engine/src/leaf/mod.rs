//! Leaf producers: iterators with no subiterators of their own (spec.md
//! §1 "implemented by primitive-set producers (full scan, GMAP/HMAP
//! lookups, VIP, fixed-array, sorted-merge)").

pub mod all;
pub mod fixed;
pub mod idset;
pub mod null;

pub use all::AllIterator;
pub use fixed::FixedIterator;
pub use idset::IdSetIterator;
pub use null::NullIterator;
