//! Bramble Graph - the backlink index
//!
//! Pages link to other pages. This crate inverts those links so that,
//! for any page, we can list the pages pointing at it. The index is
//! rebuilt from scratch on every crawl and is read-only afterwards.

mod builder;
mod index;
mod query;

pub use builder::BacklinkBuilder;
pub use index::{BacklinkIndex, IndexCounts};
pub use query::{BacklinkReport, ExportStats, IndexExport};
