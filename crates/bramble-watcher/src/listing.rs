//! Page listings: browsing a directory and the most recently changed
//! pages. Both are crawls with modification times recorded; no page
//! content is read.

use crate::cancel::CancellationToken;
use crate::crawler::{CrawlOptions, DiscoveredPage};
use crate::error::Result;
use crate::pipeline::run_pipeline;
use bramble_core::{ContentRoot, Settings};
use serde::Serialize;
use std::cmp::Ordering;
use std::time::SystemTime;

/// A page as it appears in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageEntry {
    pub page_name: String,
    pub file_name: String,
    pub mod_time: Option<SystemTime>,
}

impl From<DiscoveredPage> for PageEntry {
    fn from(found: DiscoveredPage) -> Self {
        Self {
            page_name: found.page_name,
            file_name: found.file_name,
            mod_time: found.mod_time,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Name,
    ModTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Only list pages below this directory (`projects` or `projects/`).
    pub dir: Option<String>,
    pub sort: SortKey,
    pub order: SortOrder,
}

/// Lists pages, optionally restricted to one directory.
pub fn list_pages(
    root: &ContentRoot,
    settings: &Settings,
    options: &ListOptions,
    cancel: &CancellationToken,
) -> Result<Vec<PageEntry>> {
    let output = run_pipeline(
        root,
        settings,
        CrawlOptions { record_mod_time: true },
        cancel,
        Vec::new,
        |entries: &mut Vec<PageEntry>, found| {
            entries.push(found.into());
            Ok(())
        },
    )?;

    let prefix = options
        .dir
        .as_deref()
        .map(|dir| dir.trim_matches('/'))
        .filter(|dir| !dir.is_empty() && *dir != ".")
        .map(|dir| format!("{}/", dir));

    let mut entries: Vec<PageEntry> = output
        .partials
        .into_iter()
        .flatten()
        .filter(|entry| match &prefix {
            Some(prefix) => entry.page_name.starts_with(prefix.as_str()),
            None => true,
        })
        .collect();
    sort_entries(&mut entries, options.sort, options.order);
    Ok(entries)
}

/// The `limit` most recently modified pages, newest first.
pub fn recent_pages(
    root: &ContentRoot,
    settings: &Settings,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<PageEntry>> {
    let options = ListOptions {
        dir: None,
        sort: SortKey::ModTime,
        order: SortOrder::Descending,
    };
    let mut entries = list_pages(root, settings, &options, cancel)?;
    entries.truncate(limit);
    Ok(entries)
}

fn sort_entries(entries: &mut [PageEntry], key: SortKey, order: SortOrder) {
    entries.sort_by(|a, b| {
        let ord = match key {
            SortKey::Name => a.page_name.cmp(&b.page_name),
            SortKey::ModTime => a.mod_time.cmp(&b.mod_time),
        };
        let ord = match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        };
        // Equal times still list in a stable, readable order.
        ord.then_with(|| match key {
            SortKey::Name => Ordering::Equal,
            SortKey::ModTime => a.page_name.cmp(&b.page_name),
        })
    });
}
