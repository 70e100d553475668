//! Builds iterator trees from typed constraints and drives them to a
//! page of results (spec.md §4.5's optimizer, §6/§7's user-visible
//! failure codes).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod page;
pub mod plan;

pub use page::{run_exhaustive, run_to_page, Page, PageOutcome};
pub use gravel_engine::CommitOutcome;
pub use plan::{build_and_commit, ConstraintSpec, Field, LinkageLookup};
