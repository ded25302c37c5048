//! Error types for content access.
//!
//! We keep errors simple and actionable. Each variant tells you
//! exactly what went wrong and (usually) which page or path was involved.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for functions that touch the content tree.
pub type Result<T> = std::result::Result<T, ContentError>;

/// Things that can go wrong when reading or writing pages.
#[derive(Error, Debug)]
pub enum ContentError {
    /// Couldn't read or write a path below the content root.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path would escape the content root (absolute, or uses `..`).
    #[error("path '{0}' is outside the content directory")]
    OutsideRoot(PathBuf),

    /// None of the candidate files for this page exist.
    #[error("page '{0}' not found")]
    PageNotFound(String),

    /// The page name is empty or otherwise unusable.
    #[error("invalid page name '{0}'")]
    InvalidPageName(String),

    /// Editing is disabled for this content directory.
    #[error("content directory is read-only")]
    ReadOnly,

    /// Refusing to save an empty page. A single space is enough.
    #[error("refusing to save empty content; to save an empty page, put at least a space")]
    EmptyContent,

    /// The settings file exists but could not be parsed.
    #[error("invalid settings in '{path}': {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ContentError {
    /// Creates an IO error with the path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the underlying cause is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            Self::PageNotFound(_) => true,
            _ => false,
        }
    }

    /// Returns true if the caller sent something we won't act on,
    /// as opposed to the content tree misbehaving.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::OutsideRoot(_) | Self::InvalidPageName(_) | Self::ReadOnly | Self::EmptyContent
        )
    }
}
