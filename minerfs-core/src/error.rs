//! Crate-wide error types.
//!
//! Mirrors the split the teacher codebase draws between a hard [`Error`]
//! (returned from fallible constructors and from operations the caller is
//! meant to observe directly) and [`NonCriticalError`], the per-item failure
//! kind fed through the queue/pool machinery, where a single bad file must
//! never abort a crawl or a drain (see §7 of the specification).

use std::io;
use std::path::PathBuf;

use crate::uri::Uri;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("root not found: {0}")]
    RootNotFound(Uri),
    #[error("root already added: {0}")]
    RootAlreadyAdded(Uri),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Rules(#[from] crate::rules::Error),
    #[error("failed to install filesystem watch: {0}")]
    Monitor(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A per-item failure kind, surfaced through [`crate::pool::ProcessingPool`]
/// completions. Never propagated as an [`Error`] — the controller logs it at
/// the level prescribed in the specification and keeps draining.
#[derive(thiserror::Error, Debug, Clone)]
pub enum NonCriticalError {
    /// The entry disappeared between discovery and processing. Logged at
    /// info; the item is dropped, no retry.
    #[error("not found: {0}")]
    NotFound(Uri),

    /// Cooperatively aborted via the item's cancel token. Silent.
    #[error("cancelled: {0}")]
    Cancelled(Uri),

    /// A transient OS error (EMFILE, ENFILE, ...). Retried with backoff by
    /// [`crate::retry::RetryTracker`] before being demoted to `IoPermanent`.
    #[error("transient I/O error for {uri}: {message}")]
    IoTransient { uri: Uri, message: String },

    /// A transient error exhausted its retry budget, or the OS reported a
    /// non-recoverable condition outright.
    #[error("permanent I/O error for {uri}: {message}")]
    IoPermanent { uri: Uri, message: String },

    /// The store rejected a batch update or query.
    #[error("store error for {uri}: {message}")]
    Store { uri: Uri, message: String },

    /// The extractor violated the `process_file`/`notify_file` contract,
    /// e.g. called `notify_file` after declining the file.
    #[error("programming error ({kind}) for {uri}: {message}")]
    Programming {
        uri: Uri,
        kind: &'static str,
        message: String,
    },
}

impl NonCriticalError {
    /// Whether this error should be retried by [`crate::retry::RetryTracker`]
    /// rather than dropped immediately.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::IoTransient { .. })
    }

    #[must_use]
    pub const fn uri(&self) -> &Uri {
        match self {
            Self::NotFound(uri)
            | Self::Cancelled(uri)
            | Self::IoTransient { uri, .. }
            | Self::IoPermanent { uri, .. }
            | Self::Store { uri, .. }
            | Self::Programming { uri, .. } => uri,
        }
    }
}
