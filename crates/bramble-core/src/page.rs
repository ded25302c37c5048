//! Page representation and name resolution.
//!
//! A Page is the logical unit of content: a markdown file below the
//! content root, addressed by its path without the file suffix
//! (`projects/garden` for `projects/garden.md`).

use crate::fingerprint::fingerprint;
use serde::Serialize;
use std::time::SystemTime;

/// Suffixes a page's backing file may carry, in priority order.
///
/// The first entry is the canonical suffix used for new files.
pub const PAGE_SUFFIXES: &[&str] = &[".md", ".markdown"];

/// A page read from the content tree.
///
/// Pages are values: once read they are never mutated. Re-reading the
/// file produces a new Page.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// Slash-separated path relative to the content root, no suffix.
    pub page_name: String,

    /// Path relative to the content root, with suffix.
    pub file_name: String,

    /// Content lossily decoded as UTF-8, for display and matching.
    pub content: String,

    /// Content exactly as stored on disk.
    #[serde(skip)]
    pub raw: Vec<u8>,

    /// Output of the content transform hook, if one is registered.
    pub transformed: Option<String>,

    /// Last modification time reported by the filesystem.
    pub mod_time: Option<SystemTime>,

    /// Whether the page is backed by a file on disk.
    pub exists: bool,
}

impl Page {
    /// Creates a page that has not been read yet.
    pub fn unread(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        Self {
            page_name: file_to_page(&file_name).to_string(),
            file_name,
            content: String::new(),
            raw: Vec::new(),
            transformed: None,
            mod_time: None,
            exists: false,
        }
    }

    /// Builder pattern: set content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self.raw = self.content.as_bytes().to_vec();
        self.exists = true;
        self
    }

    /// Builder pattern: set content from the bytes stored on disk.
    pub fn with_raw(mut self, raw: Vec<u8>) -> Self {
        self.content = String::from_utf8_lossy(&raw).into_owned();
        self.raw = raw;
        self.exists = true;
        self
    }

    /// Builder pattern: set the transformed variant.
    pub fn with_transformed(mut self, transformed: impl Into<String>) -> Self {
        self.transformed = Some(transformed.into());
        self
    }

    /// Builder pattern: set modification time.
    pub fn with_mod_time(mut self, mod_time: SystemTime) -> Self {
        self.mod_time = Some(mod_time);
        self
    }

    /// The text that indexing and search look at: the transformed
    /// variant when present, the raw content otherwise.
    pub fn text(&self) -> &str {
        self.transformed.as_deref().unwrap_or(&self.content)
    }

    /// Fingerprint of the raw content.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.raw)
    }
}

/// Returns true if `file` carries one of the page suffixes.
pub fn is_page_file(file: &str) -> bool {
    PAGE_SUFFIXES.iter().any(|suffix| file.ends_with(suffix))
}

/// Strips the page suffix from a file name.
///
/// Names without a page suffix are returned unchanged.
pub fn file_to_page(file: &str) -> &str {
    PAGE_SUFFIXES
        .iter()
        .find_map(|suffix| file.strip_suffix(suffix))
        .unwrap_or(file)
}

/// Returns the canonical file name for a new page.
pub fn page_to_file(page: &str) -> String {
    format!("{}{}", page, PAGE_SUFFIXES[0])
}

/// Returns every file name that may back `page`, in priority order.
pub fn page_candidates(page: &str) -> Vec<String> {
    PAGE_SUFFIXES
        .iter()
        .map(|suffix| format!("{}{}", page, suffix))
        .collect()
}

/// Resolves a user-supplied name that may be either a page name or a
/// file name into the list of files to try.
pub fn candidates_for(name: &str) -> Vec<String> {
    if is_page_file(name) {
        vec![name.to_string()]
    } else {
        page_candidates(name)
    }
}

/// Splits a user-supplied destination into `(page_name, file_name)`.
///
/// `Performance/SIMD` becomes `("Performance/SIMD", "Performance/SIMD.md")`,
/// `notes.markdown` keeps its suffix.
pub fn split_destination(name: &str) -> (String, String) {
    if is_page_file(name) {
        (file_to_page(name).to_string(), name.to_string())
    } else {
        (name.to_string(), page_to_file(name))
    }
}
