//! Bramble Watcher - crawling, indexing, search and change watching
//!
//! This crate handles the file system side of things:
//! - Crawling the content tree with a pool of workers
//! - Building the backlink index from a fresh crawl
//! - Searching page content with progress reporting
//! - Renaming pages and rewriting links to them
//! - Watching a page for changes
//!
//! Every long-running operation takes a [`CancellationToken`]; the
//! first worker to finish, fail or observe cancellation stops the rest.

mod cancel;
mod crawler;
mod error;
mod indexer;
mod listing;
mod pipeline;
mod queue;
mod rename;
mod search;
mod watch;

pub use cancel::CancellationToken;
pub use crawler::{CrawlOptions, Crawler, DiscoveredPage};
pub use error::{EngineError, Result};
pub use indexer::index_content;
pub use listing::{list_pages, recent_pages, ListOptions, PageEntry, SortKey, SortOrder};
pub use queue::{PopError, WorkQueue};
pub use rename::{rename_page, rewrite_links, RenameReport, SkippedReferrer};
pub use search::{search, search_stream, Match, SearchEvent, SearchQuery, SearchStream};
pub use watch::{watch_page, ChangeEvent, PageWatch};
