//! Backlink index build.
//!
//! Crawls the content tree, reads every page, extracts its links and
//! inverts them into a [`BacklinkIndex`].

use crate::cancel::CancellationToken;
use crate::crawler::CrawlOptions;
use crate::error::Result;
use crate::pipeline::run_pipeline;
use bramble_core::{extract_links, ContentRoot, Settings};
use bramble_graph::{BacklinkBuilder, BacklinkIndex};
use std::time::Instant;
use tracing::{debug, info};

/// Builds a fresh backlink index for the whole content tree.
///
/// Unreadable directories are skipped, but a page that was found and
/// then cannot be read fails the whole build: renames rely on the index
/// being complete.
///
/// # Example
///
/// ```no_run
/// use bramble_core::{ContentRoot, Settings};
/// use bramble_watcher::{index_content, CancellationToken};
///
/// let root = ContentRoot::open("./notes").unwrap();
/// let index = index_content(&root, &Settings::default(), &CancellationToken::new()).unwrap();
/// println!("{} pages link to 'todo'", index.backlinks("todo").len());
/// ```
pub fn index_content(
    root: &ContentRoot,
    settings: &Settings,
    cancel: &CancellationToken,
) -> Result<BacklinkIndex> {
    let start = Instant::now();
    info!("indexing all pages in {}", root.path().display());

    let output = run_pipeline(
        root,
        settings,
        CrawlOptions::default(),
        cancel,
        BacklinkBuilder::new,
        |builder, found| {
            let page = root.read_page(&found.file_name)?;
            let links = extract_links(page.text());
            debug!("{}: {} links", page.page_name, links.len());
            builder.add_page(page.page_name, links);
            Ok(())
        },
    )?;

    let mut builder = BacklinkBuilder::new();
    for partial in output.partials {
        builder.merge(partial);
    }
    let links = builder.link_count();
    let index = builder.build(output.counts);

    info!(
        "discovered in {:.2}s: directories: {}, pages: {}, links: {}",
        start.elapsed().as_secs_f64(),
        output.counts.dirs,
        output.counts.pages,
        links
    );
    Ok(index)
}
