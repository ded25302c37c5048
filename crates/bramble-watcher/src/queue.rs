//! Coalescing work queue.
//!
//! All pending items live in a single batch that is passed around
//! through two single-slot channels: `items` holds the batch while it is
//! non-empty, `empty` holds a token while there is nothing queued.
//! Exactly one of the two slots is full whenever nobody holds the batch,
//! so pushes and pops are serialized by the exchange itself and no
//! per-item synchronization is allocated.

use crate::cancel::CancellationToken;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why [`WorkQueue::pop_or_wait`] returned without an item.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopError {
    #[error("cancelled while waiting for work")]
    Cancelled,
    #[error("no work arrived in time")]
    TimedOut,
}

/// Unbounded multi-consumer FIFO.
pub struct WorkQueue<T> {
    items_tx: Sender<VecDeque<T>>,
    items_rx: Receiver<VecDeque<T>>,
    empty_tx: Sender<()>,
    empty_rx: Receiver<()>,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        let (items_tx, items_rx) = bounded(1);
        let (empty_tx, empty_rx) = bounded(1);
        // Start out empty.
        let _ = empty_tx.try_send(());
        Self {
            items_tx,
            items_rx,
            empty_tx,
            empty_rx,
        }
    }

    /// Appends an item. Only waits for the batch to be handed back by a
    /// concurrent push or pop, never for consumers.
    pub fn push(&self, item: T) {
        let mut batch = select! {
            recv(self.items_rx) -> batch => batch.unwrap_or_default(),
            recv(self.empty_rx) -> _ => VecDeque::new(),
        };
        batch.push_back(item);
        let _ = self.items_tx.send(batch);
    }

    /// Takes the oldest item, waiting up to `timeout` for one to arrive.
    ///
    /// Each pushed item is returned by exactly one call.
    pub fn pop_or_wait(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<T, PopError> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut batch = select! {
                recv(self.items_rx) -> batch => batch.unwrap_or_default(),
                recv(cancel.done()) -> _ => return Err(PopError::Cancelled),
                default(deadline.saturating_duration_since(Instant::now())) => {
                    return Err(PopError::TimedOut)
                }
            };
            let item = batch.pop_front();
            if batch.is_empty() {
                let _ = self.empty_tx.send(());
            } else {
                let _ = self.items_tx.send(batch);
            }
            if let Some(item) = item {
                return Ok(item);
            }
        }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
