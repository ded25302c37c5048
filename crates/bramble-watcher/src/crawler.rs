//! Concurrent directory crawler.
//!
//! A crawl walks the content tree with a fixed pool of workers sharing a
//! [`WorkQueue`] of directories. Page files found along the way are sent
//! to the read stage through a channel supplied by the caller.
//!
//! Termination is tracked by the `pending` counter: every discovered
//! directory increments it before being queued, and the worker that
//! lists it decrements it only after all of its subdirectories have been
//! counted. The counter therefore reaches zero exactly when the whole
//! tree has been listed.

use crate::cancel::CancellationToken;
use crate::error::{EngineError, Result};
use crate::queue::{PopError, WorkQueue};
use bramble_core::{is_page_file, file_to_page, ContentError, ContentRoot, Settings};
use bramble_graph::IndexCounts;
use crossbeam_channel::{select, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::thread;
use std::time::SystemTime;
use tracing::{debug, warn};

/// The content root, as a relative directory path.
const ROOT_DIR: &str = ".";

/// A page file found by the crawler, not read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPage {
    pub page_name: String,
    pub file_name: String,
    /// Only set when the crawl records modification times.
    pub mod_time: Option<SystemTime>,
}

/// Options for a single crawl.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlOptions {
    /// Stat every page file and record its modification time.
    pub record_mod_time: bool,
}

/// State of one crawl. Counters live here, so independent crawls (an
/// index build and a search, say) never share anything.
pub struct Crawler<'a> {
    root: &'a ContentRoot,
    settings: &'a Settings,
    options: CrawlOptions,
    queue: WorkQueue<String>,
    pending: AtomicI64,
    dirs: AtomicU64,
    pages: AtomicU64,
}

impl<'a> Crawler<'a> {
    pub fn new(root: &'a ContentRoot, settings: &'a Settings, options: CrawlOptions) -> Self {
        Self {
            root,
            settings,
            options,
            queue: WorkQueue::new(),
            pending: AtomicI64::new(0),
            dirs: AtomicU64::new(0),
            pages: AtomicU64::new(0),
        }
    }

    /// Crawls the whole tree, sending each page file to `pages`.
    ///
    /// Blocks until every worker has exited. `pages` is dropped before
    /// returning, which tells the read stage that nothing more is coming.
    pub fn run(&self, pages: Sender<DiscoveredPage>, cancel: &CancellationToken) -> Result<IndexCounts> {
        // Cancelled by the first worker to exit, whatever the reason.
        let stop = cancel.child();
        let first_err: Mutex<Option<EngineError>> = Mutex::new(None);

        self.discover(ROOT_DIR.to_string());

        let workers = self.settings.worker_count();
        debug!("crawling with {} workers", workers);

        thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let pages = pages.clone();
                    let stop = &stop;
                    let first_err = &first_err;
                    s.spawn(move || {
                        if let Err(e) = self.work(&pages, stop) {
                            first_err.lock().get_or_insert(e);
                        }
                        stop.cancel();
                    })
                })
                .collect();
            for handle in handles {
                if handle.join().is_err() {
                    first_err
                        .lock()
                        .get_or_insert(EngineError::WorkerPanicked("crawl"));
                }
            }
        });
        drop(pages);

        if let Some(e) = first_err.into_inner() {
            return Err(e);
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(IndexCounts {
            dirs: self.dirs.load(Ordering::SeqCst),
            pages: self.pages.load(Ordering::SeqCst),
        })
    }

    fn discover(&self, dir: String) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.dirs.fetch_add(1, Ordering::SeqCst);
        self.queue.push(dir);
    }

    fn work(&self, pages: &Sender<DiscoveredPage>, stop: &CancellationToken) -> Result<()> {
        while self.pending.load(Ordering::SeqCst) > 0 {
            let dir = match self.queue.pop_or_wait(stop, self.settings.pop_timeout()) {
                Ok(dir) => dir,
                // Another worker may be about to push; re-check pending.
                Err(PopError::TimedOut) => continue,
                // A sibling finished or failed; its outcome is what counts.
                Err(PopError::Cancelled) => return Ok(()),
            };
            let listed = self.list(&dir, pages, stop);
            self.pending.fetch_sub(1, Ordering::SeqCst);
            listed?;
        }
        Ok(())
    }

    fn list(&self, dir: &str, pages: &Sender<DiscoveredPage>, stop: &CancellationToken) -> Result<()> {
        let entries = match self.root.list_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("skipping directory {}: {}", dir, e);
                return Ok(());
            }
        };

        for entry in entries {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!("skipping {:?} in {}: name is not valid UTF-8", raw, dir);
                    continue;
                }
            };
            // Hidden entries, including the settings directory.
            if name.starts_with('.') {
                continue;
            }
            let rel = join_rel(dir, &name);
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!("skipping {}: {}", rel, e);
                    continue;
                }
            };

            if file_type.is_dir() {
                self.discover(rel);
                continue;
            }
            if !is_page_file(&name) {
                continue;
            }

            let mod_time = if self.options.record_mod_time {
                let modified = entry.metadata().and_then(|meta| meta.modified());
                Some(modified.map_err(|e| ContentError::io(self.root.path().join(&rel), e))?)
            } else {
                None
            };
            self.pages.fetch_add(1, Ordering::SeqCst);

            let page = DiscoveredPage {
                page_name: file_to_page(&rel).to_string(),
                file_name: rel,
                mod_time,
            };
            // Blocks while readers are busy.
            select! {
                send(pages, page) -> sent => {
                    if sent.is_err() {
                        return Err(EngineError::Cancelled);
                    }
                }
                recv(stop.done()) -> _ => return Ok(()),
            }
        }
        Ok(())
    }
}

/// Joins a content-relative directory and an entry name.
fn join_rel(dir: &str, name: &str) -> String {
    if dir == ROOT_DIR {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::fs;
    use tempfile::tempdir;

    fn settings() -> Settings {
        Settings {
            workers: 3,
            pop_timeout_ms: 10,
            ..Settings::default()
        }
    }

    #[test]
    fn test_join_rel() {
        assert_eq!(join_rel(".", "a.md"), "a.md");
        assert_eq!(join_rel("notes", "a.md"), "notes/a.md");
    }

    #[test]
    fn test_crawl_counts_every_directory_and_page() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("a/b/c")).unwrap();
        fs::create_dir_all(base.join("d")).unwrap();
        fs::create_dir_all(base.join(".hidden")).unwrap();
        fs::write(base.join("index.md"), "x").unwrap();
        fs::write(base.join("a/one.md"), "x").unwrap();
        fs::write(base.join("a/b/two.markdown"), "x").unwrap();
        fs::write(base.join("a/b/c/three.md"), "x").unwrap();
        fs::write(base.join("a/b/c/notes.txt"), "x").unwrap();
        fs::write(base.join(".hidden/secret.md"), "x").unwrap();

        let root = ContentRoot::open(base).unwrap();
        let settings = settings();
        let crawler = Crawler::new(&root, &settings, CrawlOptions::default());
        let (tx, rx) = unbounded();
        let counts = crawler.run(tx, &CancellationToken::new()).unwrap();

        // root, a, a/b, a/b/c, d
        assert_eq!(counts, IndexCounts { dirs: 5, pages: 4 });

        let mut found: Vec<_> = rx.iter().map(|page| page.page_name).collect();
        found.sort();
        assert_eq!(found, ["a/b/c/three", "a/b/two", "a/one", "index"]);
    }

    #[test]
    fn test_crawl_records_mod_time_on_request() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("page.md"), "x").unwrap();

        let root = ContentRoot::open(dir.path()).unwrap();
        let settings = settings();
        let options = CrawlOptions { record_mod_time: true };
        let (tx, rx) = unbounded();
        Crawler::new(&root, &settings, options)
            .run(tx, &CancellationToken::new())
            .unwrap();

        let page = rx.recv().unwrap();
        assert_eq!(page.file_name, "page.md");
        assert!(page.mod_time.is_some());
    }

    #[test]
    fn test_directory_gone_before_listing_is_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("kept")).unwrap();
        fs::write(dir.path().join("index.md"), "x").unwrap();
        fs::write(dir.path().join("kept/page.md"), "x").unwrap();

        let root = ContentRoot::open(dir.path()).unwrap();
        let settings = settings();
        let crawler = Crawler::new(&root, &settings, CrawlOptions::default());
        // Queued as if seen in a listing, then deleted before its own turn.
        crawler.discover("vanished".to_string());
        let (tx, rx) = unbounded();
        let counts = crawler.run(tx, &CancellationToken::new()).unwrap();

        assert_eq!(counts, IndexCounts { dirs: 3, pages: 2 });
        let mut found: Vec<_> = rx.iter().map(|page| page.page_name).collect();
        found.sort();
        assert_eq!(found, ["index", "kept/page"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_names_that_are_not_utf8_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.md"), "x").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"caf\xe9.md")), "x").unwrap();
        fs::create_dir(dir.path().join(OsStr::from_bytes(b"d\xe9j\xe0"))).unwrap();

        let root = ContentRoot::open(dir.path()).unwrap();
        let settings = settings();
        let (tx, rx) = unbounded();
        let counts = Crawler::new(&root, &settings, CrawlOptions::default())
            .run(tx, &CancellationToken::new())
            .unwrap();

        assert_eq!(counts, IndexCounts { dirs: 1, pages: 1 });
        let found: Vec<_> = rx.iter().map(|page| page.page_name).collect();
        assert_eq!(found, ["index"]);
    }

    #[test]
    fn test_crawl_of_empty_tree() {
        let dir = tempdir().unwrap();
        let root = ContentRoot::open(dir.path()).unwrap();
        let settings = settings();
        let (tx, _rx) = unbounded();
        let counts = Crawler::new(&root, &settings, CrawlOptions::default())
            .run(tx, &CancellationToken::new())
            .unwrap();
        assert_eq!(counts, IndexCounts { dirs: 1, pages: 0 });
    }

    #[test]
    fn test_cancelled_crawl_reports_cancellation() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("page.md"), "x").unwrap();

        let root = ContentRoot::open(dir.path()).unwrap();
        let settings = settings();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, _rx) = unbounded();
        let result = Crawler::new(&root, &settings, CrawlOptions::default()).run(tx, &cancel);
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }
}
