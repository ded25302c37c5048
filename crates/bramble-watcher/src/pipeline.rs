//! Crawl and read stages wired together.
//!
//! The crawler feeds discovered pages into an unbuffered channel drained
//! by a pool of read workers. Each read worker folds pages into its own
//! accumulator, so nothing is shared between readers until they finish
//! and hand their accumulators back in bulk.

use crate::cancel::CancellationToken;
use crate::crawler::{CrawlOptions, Crawler, DiscoveredPage};
use crate::error::{EngineError, Result};
use bramble_core::{ContentRoot, Settings};
use bramble_graph::IndexCounts;
use crossbeam_channel::{bounded, select};
use parking_lot::Mutex;
use std::thread;

/// What a finished pipeline hands back.
pub(crate) struct PipelineOutput<A> {
    pub counts: IndexCounts,
    /// One accumulator per read worker.
    pub partials: Vec<A>,
}

/// Runs a crawl and feeds every page to `step` on the read workers.
///
/// The first error from either stage cancels everything else and is the
/// one returned.
pub(crate) fn run_pipeline<A, I, S>(
    root: &ContentRoot,
    settings: &Settings,
    options: CrawlOptions,
    cancel: &CancellationToken,
    init: I,
    step: S,
) -> Result<PipelineOutput<A>>
where
    A: Send,
    I: Fn() -> A + Sync,
    S: Fn(&mut A, DiscoveredPage) -> Result<()> + Sync,
{
    let stop = cancel.child();
    let first_err: Mutex<Option<EngineError>> = Mutex::new(None);
    let fail = |e: EngineError| {
        first_err.lock().get_or_insert(e);
        stop.cancel();
    };

    let crawler = Crawler::new(root, settings, options);
    let (tx, rx) = bounded::<DiscoveredPage>(0);
    let readers = settings.worker_count();

    let (counts, partials) = thread::scope(|s| {
        let crawl = s.spawn(|| match crawler.run(tx, &stop) {
            Ok(counts) => Some(counts),
            Err(e) => {
                fail(e);
                None
            }
        });

        let handles: Vec<_> = (0..readers)
            .map(|_| {
                let rx = rx.clone();
                let (init, step, stop, fail) = (&init, &step, &stop, &fail);
                s.spawn(move || {
                    let mut acc = init();
                    let result = loop {
                        select! {
                            recv(rx) -> page => match page {
                                Ok(page) => {
                                    if let Err(e) = step(&mut acc, page) {
                                        break Err(e);
                                    }
                                }
                                // Crawl finished and dropped its sender.
                                Err(_) => break Ok(()),
                            },
                            recv(stop.done()) -> _ => break Err(EngineError::Cancelled),
                        }
                    };
                    match result {
                        Ok(()) => Some(acc),
                        Err(e) => {
                            fail(e);
                            None
                        }
                    }
                })
            })
            .collect();

        let mut partials = Vec::with_capacity(readers);
        for handle in handles {
            match handle.join() {
                Ok(Some(acc)) => partials.push(acc),
                Ok(None) => {}
                Err(_) => fail(EngineError::WorkerPanicked("read")),
            }
        }
        let counts = crawl.join().unwrap_or_else(|_| {
            fail(EngineError::WorkerPanicked("crawl"));
            None
        });
        (counts, partials)
    });

    if let Some(e) = first_err.into_inner() {
        return Err(e);
    }
    match counts {
        Some(counts) => Ok(PipelineOutput { counts, partials }),
        None => Err(EngineError::Cancelled),
    }
}
