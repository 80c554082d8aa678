//! Reviewlens - review collection and keyword analysis for dynamic
//! storefront listings.
//!
//! The core is a pagination-state-recovery crawler: it reads the live DOM to
//! figure out which review page is showing, which pages were already
//! collected, and how to move forward reliably while the site re-renders
//! underneath it. Collected reviews are summarized per keyword by an LLM and
//! the result can be saved into a per-user library.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod scrape;
pub mod server;
pub mod store;
