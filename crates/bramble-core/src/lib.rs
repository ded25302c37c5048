//! Bramble Core - pages and the content tree
//!
//! This crate provides the pieces every other Bramble crate builds on:
//! the [`Page`] value type, page-name resolution, the sandboxed
//! [`ContentRoot`], link extraction and content fingerprints.
//!
//! # Example
//!
//! ```no_run
//! use bramble_core::{extract_links, ContentRoot};
//!
//! let root = ContentRoot::open("/home/me/notes").unwrap();
//! let page = root.find_page("index").unwrap();
//! for target in extract_links(page.text()).iter() {
//!     println!("{} -> {}", page.page_name, target);
//! }
//! ```

pub mod content;
pub mod error;
pub mod fingerprint;
pub mod links;
pub mod page;
pub mod settings;

pub use content::{ContentRoot, PageTransform};
pub use error::{ContentError, Result};
pub use fingerprint::fingerprint;
pub use links::{extract_links, LinkSet};
pub use page::{
    candidates_for, file_to_page, is_page_file, page_candidates, page_to_file, split_destination,
    Page, PAGE_SUFFIXES,
};
pub use settings::Settings;
