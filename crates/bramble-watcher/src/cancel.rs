//! Cancellation tokens for crawl, search and watch workers.
//!
//! A token can be polled with [`CancellationToken::is_cancelled`] or
//! waited on through [`CancellationToken::done`], which hands out a
//! channel that disconnects on cancellation. That lets a worker block in
//! `crossbeam_channel::select!` on real work and on cancellation at once.

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, cloneable cancellation signal.
///
/// Cancelling a token also cancels every token created with
/// [`CancellationToken::child`]; cancelling a child leaves the parent
/// alone.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    // Dropped on cancel, which disconnects `done`.
    signal: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
    children: Mutex<Vec<CancellationToken>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (signal, done) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                signal: Mutex::new(Some(signal)),
                done,
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creates a token that is cancelled together with this one.
    pub fn child(&self) -> Self {
        let child = Self::new();
        let mut children = self.inner.children.lock();
        if self.is_cancelled() {
            child.cancel();
        } else {
            children.retain(|c| !c.is_cancelled());
            children.push(child.clone());
        }
        child
    }

    /// Cancels this token and all of its children. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.signal.lock().take();
        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in children {
            child.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// A channel that never yields a value and disconnects once the
    /// token is cancelled. Use it as a `recv` arm in `select!`.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::select;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        token.cancel();
    }

    #[test]
    fn test_done_unblocks_select() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = std::thread::spawn(move || {
            select! {
                recv(waiter.done()) -> _ => true,
                default(Duration::from_secs(5)) => false,
            }
        });
        token.cancel();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_children_follow_parent_only() {
        let parent = CancellationToken::new();
        let child = parent.child();
        let grandchild = child.child();

        child.cancel();
        assert!(grandchild.is_cancelled());
        assert!(!parent.is_cancelled());

        let late = parent.child();
        parent.cancel();
        assert!(late.is_cancelled());
        assert!(parent.child().is_cancelled());
    }
}
