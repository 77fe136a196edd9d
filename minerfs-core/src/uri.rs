//! Canonical identifiers for filesystem entities.
//!
//! Every queue, the in-flight set, and the store sink key on [`Uri`], never
//! on a raw [`Path`]. Keeping it a thin, cheaply-clonable wrapper around an
//! `Arc<str>` (rather than a `PathBuf`) means queue membership checks and
//! hash-map lookups don't pay for a path re-parse on every comparison.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A canonical, absolute `file://`-scheme identifier.
///
/// Two `Uri`s are equal iff they were built from the same absolute,
/// `/`-separated path string. No attempt is made to resolve symlinks here —
/// canonicalization (if desired) is the [`crate::data_provider::DataProvider`]
/// implementation's job at discovery time.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uri(Arc<str>);

const SCHEME: &str = "file://";

impl Uri {
    /// Builds a `Uri` from an absolute filesystem path. The path is not
    /// required to exist; non-UTF-8 paths are lossily converted, matching
    /// the teacher's own `NonUtf8PathError`-avoidant fallback in
    /// `sd-utils`'s path helpers for non-essential display contexts.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut s = String::with_capacity(SCHEME.len() + path.as_os_str().len());
        s.push_str(SCHEME);
        s.push_str(&path.to_string_lossy());
        Self(Arc::from(s.replace('\\', "/")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The filesystem path this URI denotes, stripping the `file://` scheme.
    #[must_use]
    pub fn path(&self) -> &Path {
        Path::new(self.0.strip_prefix(SCHEME).unwrap_or(&self.0))
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(self.0.as_ref())
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.path().parent().map(Self::from_path)
    }

    /// A child URI formed by joining `name` onto this URI's path.
    #[must_use]
    pub fn join(&self, name: impl AsRef<Path>) -> Self {
        Self::from_path(self.path().join(name))
    }

    /// Whether `self` is `other`, or nested under it.
    #[must_use]
    pub fn is_prefixed_by(&self, other: &Self) -> bool {
        self == other || self.path().starts_with(other.path())
    }

    /// Rewrites this URI so that the `from` prefix becomes `to`, keeping the
    /// remaining suffix untouched. Used by the move resolver (§4.7) to
    /// recompute descendant URIs after a directory rename. Returns `None` if
    /// `self` is not actually prefixed by `from`.
    #[must_use]
    pub fn rebase(&self, from: &Self, to: &Self) -> Option<Self> {
        let suffix = self.path().strip_prefix(from.path()).ok()?;
        Some(if suffix.as_os_str().is_empty() {
            to.clone()
        } else {
            to.join(suffix)
        })
    }

    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        self.path().to_path_buf()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<PathBuf> for Uri {
    fn from(path: PathBuf) -> Self {
        Self::from_path(path)
    }
}

impl From<&Path> for Uri {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}
