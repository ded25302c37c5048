//! Serializable views of the backlink index.
//!
//! These are what the CLI prints or exports; they're shaped for JSON
//! consumers rather than for lookups.

use crate::index::{BacklinkIndex, IndexCounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full index export.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexExport {
    pub version: String,
    pub stats: ExportStats,
    /// target -> referrers
    pub backlinks: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportStats {
    pub dirs: u64,
    pub pages: u64,
    pub targets: usize,
}

impl IndexExport {
    pub fn from_index(index: &BacklinkIndex) -> Self {
        let IndexCounts { dirs, pages } = index.counts();
        Self {
            version: "1.0".to_string(),
            stats: ExportStats {
                dirs,
                pages,
                targets: index.target_count(),
            },
            backlinks: index
                .iter()
                .map(|(target, referrers)| (target.to_string(), referrers.to_vec()))
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Backlinks of a single page.
#[derive(Debug, Serialize, Deserialize)]
pub struct BacklinkReport {
    pub page_name: String,
    pub referrers: Vec<String>,
}

impl BacklinkReport {
    pub fn for_page(index: &BacklinkIndex, page_name: &str) -> Self {
        Self {
            page_name: page_name.to_string(),
            referrers: index.backlinks(page_name).to_vec(),
        }
    }
}
