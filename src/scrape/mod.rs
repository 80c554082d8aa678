//! Review collection engine.
//!
//! The pipeline per rating category is: open an isolated browser context,
//! apply the rating filter once, then loop {read pagination state → extract
//! the current page if unvisited → advance}. The live DOM is the only source
//! of truth for pagination state; it is re-read on every iteration because
//! the site can replace the pagination bar wholesale between renders.

pub mod browser;
pub mod coordinator;
pub mod driver;
pub mod extract;
pub mod filter;
pub mod pagination;
pub mod policy;
pub mod session;
#[cfg(test)]
pub(crate) mod testkit;
pub mod types;

pub use coordinator::{CollectionReport, Coordinator};
pub use types::{
    CollectionTarget, RatingCategory, ReviewRecord, SessionOutcome, TerminationReason,
};
