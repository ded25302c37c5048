//! Change notifications for a single page.
//!
//! A subscription compares the caller's last known fingerprint with the
//! page on disk right away, then re-reads the page whenever the
//! filesystem reports activity on it or the poll interval elapses. An
//! event is emitted only when the content differs from what was last
//! delivered, so a change seen by both paths is reported once.

use crate::cancel::CancellationToken;
use crate::error::{EngineError, Result};
use bramble_core::{candidates_for, ContentRoot, Page, Settings};
use crossbeam_channel::{bounded, never, select, tick, Receiver, Sender};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sent whenever the watched page's content changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub changed: bool,
    /// Fingerprint of the new content.
    pub fingerprint: String,
}

impl ChangeEvent {
    fn for_page(page: &Page) -> Self {
        Self {
            changed: true,
            fingerprint: page.fingerprint(),
        }
    }
}

/// A live subscription to one page.
///
/// Dropping it stops the filesystem watcher and the poller.
pub struct PageWatch {
    events: Receiver<ChangeEvent>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PageWatch {
    /// The event channel. It closes when the subscription ends.
    pub fn events(&self) -> &Receiver<ChangeEvent> {
        &self.events
    }

    /// Returns immediately with any pending changes.
    pub fn poll(&self) -> Vec<ChangeEvent> {
        self.events.try_iter().collect()
    }

    /// Waits for the next change with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Ends the subscription.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PageWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Subscribes to changes of `name`, a page or file name.
///
/// If `last_fingerprint` is given and no longer matches the page, the
/// first event is available immediately.
pub fn watch_page(
    root: &ContentRoot,
    name: &str,
    last_fingerprint: Option<&str>,
    settings: &Settings,
    cancel: &CancellationToken,
) -> Result<PageWatch> {
    let page = root.find_page(name)?;
    let candidates = candidates_for(name);
    let cancel = cancel.child();
    let (tx, events) = bounded(8);

    if let Some(known) = last_fingerprint {
        if known != page.fingerprint() {
            debug!("{} changed while unsubscribed", page.file_name);
            let _ = tx.try_send(ChangeEvent::for_page(&page));
        }
    }

    let (wake_tx, wake_rx) = bounded(1);
    let path = root.resolve(&page.file_name)?;
    let watcher = match watch_file(&path, wake_tx) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("file events unavailable for {}, polling only: {}", path.display(), e);
            None
        }
    };
    info!("watching {} for changes", page.file_name);

    let handle = {
        let root = root.clone();
        let cancel = cancel.clone();
        let interval = settings.poll_interval();
        thread::Builder::new()
            .name("bramble-watch".into())
            .spawn(move || {
                let wake = if watcher.is_some() { wake_rx } else { never() };
                run_watch(&root, &candidates, page, &wake, interval, &cancel, &tx);
                // The watcher lives exactly as long as the subscription.
                drop(watcher);
            })
            .map_err(EngineError::Spawn)?
    };

    Ok(PageWatch {
        events,
        cancel,
        handle: Some(handle),
    })
}

/// Watches the directory containing `path`, waking on events that name
/// the file itself. Editors often replace files rather than write them,
/// so watching the file directly would miss changes.
fn watch_file(path: &Path, wake: Sender<()>) -> notify::Result<RecommendedWatcher> {
    let file_name: Option<OsString> = path.file_name().map(OsStr::to_os_string);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            let ours = event
                .paths
                .iter()
                .any(|p| p.file_name() == file_name.as_deref());
            if ours {
                // A wake-up already pending covers this one.
                let _ = wake.try_send(());
            }
        }
        Err(e) => warn!("watch error: {}", e),
    })?;
    let dir = path.parent().unwrap_or(path);
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn run_watch(
    root: &ContentRoot,
    candidates: &[String],
    mut last: Page,
    wake: &Receiver<()>,
    interval: Duration,
    cancel: &CancellationToken,
    tx: &Sender<ChangeEvent>,
) {
    let poller = tick(interval);
    loop {
        select! {
            recv(cancel.done()) -> _ => return,
            recv(poller) -> _ => {}
            recv(wake) -> _ => {}
        }
        let current = match root.read_first(candidates) {
            Ok(page) => page,
            Err(e) => {
                warn!("stopped watching {}: {}", last.file_name, e);
                return;
            }
        };
        if current.raw == last.raw {
            continue;
        }
        let event = ChangeEvent::for_page(&current);
        last = current;
        debug!("{} changed", last.file_name);
        select! {
            send(tx, event) -> sent => {
                if sent.is_err() {
                    return;
                }
            }
            recv(cancel.done()) -> _ => return,
        }
    }
}
