//! The immutable backlink index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How much of the content tree a crawl covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCounts {
    /// Directories visited, including the root.
    pub dirs: u64,
    /// Page files discovered.
    pub pages: u64,
}

/// Maps a page name to the sorted, distinct names of pages linking to it.
///
/// Built once per crawl by [`crate::BacklinkBuilder`] and never patched:
/// re-indexing produces a new index that replaces the old one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacklinkIndex {
    counts: IndexCounts,
    backlinks: BTreeMap<String, Vec<String>>,
}

impl BacklinkIndex {
    pub(crate) fn new(counts: IndexCounts, backlinks: BTreeMap<String, Vec<String>>) -> Self {
        Self { counts, backlinks }
    }

    /// Pages that link to `target`, sorted by name.
    pub fn backlinks(&self, target: &str) -> &[String] {
        self.backlinks
            .get(target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns true if `referrer` links to `target`.
    pub fn links_to(&self, referrer: &str, target: &str) -> bool {
        self.backlinks(target)
            .binary_search_by(|name| name.as_str().cmp(referrer))
            .is_ok()
    }

    /// Every link target with at least one referrer, sorted.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.backlinks.keys().map(String::as_str)
    }

    /// Iterates over `(target, referrers)` in target order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.backlinks
            .iter()
            .map(|(target, referrers)| (target.as_str(), referrers.as_slice()))
    }

    /// Number of distinct link targets.
    pub fn target_count(&self) -> usize {
        self.backlinks.len()
    }

    pub fn counts(&self) -> IndexCounts {
        self.counts
    }
}
