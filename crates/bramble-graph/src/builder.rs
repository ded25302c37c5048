//! Backlink index builder.
//!
//! The builder collects each page's outgoing links and, once every page
//! has been added, inverts them into a target -> referrers map.
//!
//! Partial builders are meant to be filled by one worker each and then
//! merged in bulk, so no lock is held while pages are being read.

use crate::index::{BacklinkIndex, IndexCounts};
use bramble_core::LinkSet;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Accumulates page -> outgoing links, then inverts them.
#[derive(Debug, Default)]
pub struct BacklinkBuilder {
    links: HashMap<String, LinkSet>,
}

impl BacklinkBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outgoing links of a page.
    ///
    /// Adding the same page twice keeps the later link set.
    pub fn add_page(&mut self, page_name: impl Into<String>, links: LinkSet) {
        self.links.insert(page_name.into(), links);
    }

    /// Moves every page of `other` into this builder.
    pub fn merge(&mut self, other: BacklinkBuilder) {
        self.links.extend(other.links);
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Total outgoing links across all pages.
    pub fn link_count(&self) -> usize {
        self.links.values().map(LinkSet::len).sum()
    }

    /// Inverts the collected links and returns the finished index.
    ///
    /// Targets are taken literally; a page may be a backlink target
    /// without existing yet.
    pub fn build(self, counts: IndexCounts) -> BacklinkIndex {
        let mut backlinks: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (page_name, links) in &self.links {
            for target in links.iter() {
                backlinks
                    .entry(target.to_string())
                    .or_default()
                    .push(page_name.clone());
            }
        }
        for referrers in backlinks.values_mut() {
            referrers.sort();
        }
        debug!(
            "inverted links of {} pages into {} targets",
            self.links.len(),
            backlinks.len()
        );
        BacklinkIndex::new(counts, backlinks)
    }
}
