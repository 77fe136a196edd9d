//! Live change monitoring (§4.2).
//!
//! A monitor owns a `directory_uri -> watch handle` mapping and turns raw OS
//! events into the five normalized signals below, coalescing bursts within a
//! quiet window and filtering out locked/temporary files before they ever
//! reach the engine.

pub mod debounce;
#[cfg(feature = "local-fs")]
pub mod notify_monitor;

use crate::uri::Uri;

/// A normalized change signal, as emitted by a monitor implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Created { uri: Uri, is_dir: bool },
    Updated { uri: Uri, is_dir: bool },
    AttributeUpdated { uri: Uri, is_dir: bool },
    Deleted { uri: Uri, is_dir: bool },
    Moved {
        from: Uri,
        to: Uri,
        is_dir: bool,
        /// Whether `from` was a directory under an active watch. When
        /// `false`, `from` may be synthetic and the controller should treat
        /// this as a discovery of `to` rather than a true rename (§4.2).
        is_source_monitored: bool,
    },
}

impl MonitorEvent {
    #[must_use]
    pub fn primary_uri(&self) -> &Uri {
        match self {
            Self::Created { uri, .. }
            | Self::Updated { uri, .. }
            | Self::AttributeUpdated { uri, .. }
            | Self::Deleted { uri, .. } => uri,
            Self::Moved { to, .. } => to,
        }
    }
}

/// Whether `name` looks like a temporary/locked file that should never be
/// surfaced as a change (§4.2): editor swap files, partial downloads, etc.
#[must_use]
pub fn is_locked_name(name: &str) -> bool {
    name.ends_with(".part")
        || name.ends_with(".crdownload")
        || name.starts_with(".#")
}
