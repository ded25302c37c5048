//! Error types for crawl-driven operations.

use bramble_core::ContentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by indexing, search, rename and watch.
///
/// Per-item failures (an unreadable directory, a page that vanished
/// mid-search) are logged and never show up here.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Content(#[from] ContentError),

    /// The caller cancelled, or a sibling worker failed first.
    #[error("operation cancelled")]
    Cancelled,

    /// The search query was rejected before any work started.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A rename would overwrite an existing page.
    #[error("destination '{0}' already exists")]
    DestinationExists(String),

    #[error("failed to start background thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
}

impl EngineError {
    /// Returns true for requests we refuse, as opposed to engine faults.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidQuery(_) | Self::DestinationExists(_) => true,
            Self::Content(e) => e.is_client_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(EngineError::InvalidQuery("x".into()).is_client_error());
        assert!(EngineError::Content(ContentError::ReadOnly).is_client_error());
        assert!(!EngineError::Cancelled.is_client_error());
        assert!(!EngineError::WorkerPanicked("read").is_client_error());
    }
}
