//! Abstract enumeration + monitor capability over a root (§4.1).
//!
//! A [`DataProvider`] is the seam between the engine and whatever actually
//! backs a root — a local filesystem, a virtual/remote filesystem, a test
//! double. The crawler only ever talks to this trait; it never calls
//! `tokio::fs` directly.

use std::time::SystemTime;

use async_trait::async_trait;
use bitflags::bitflags;
use tokio_stream::Stream;

use crate::error::Error;
use crate::uri::Uri;

bitflags! {
    /// Flags accepted by [`DataProvider::begin`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BeginFlags: u8 {
        /// Install a monitor on every directory discovered during the walk.
        const MONITOR      = 0b0001;
        /// Recurse into subdirectories.
        const RECURSE      = 0b0010;
        /// Skip stat-ing entries (name-only enumeration); faster but the
        /// returned [`FileInfo`] will have no size/mtime.
        const NO_STAT      = 0b0100;
        /// Hint that this root should be scheduled ahead of others.
        const PRIORITY_HIGH = 0b1000;
    }
}

/// One entry yielded by an [`Enumerator`].
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub uri: Uri,
    pub is_dir: bool,
    pub mtime: Option<SystemTime>,
    pub size: Option<u64>,
    /// Platform inode/file-id, when cheaply available; used to correlate a
    /// delete+create pair across a move the monitor layer couldn't observe
    /// atomically.
    pub inode: Option<u64>,
}

/// A finite, non-restartable, lazily-produced stream of [`FileInfo`].
pub type Enumerator = std::pin::Pin<Box<dyn Stream<Item = Result<FileInfo, Error>> + Send>>;

#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Begins enumerating `root`. The returned [`Enumerator`] yields
    /// immediate children only — recursion is the crawler's job, driven by
    /// repeated calls to `begin` on discovered subdirectories.
    async fn begin(&self, root: &Uri, flags: BeginFlags) -> Result<Enumerator, Error>;

    /// Releases any resources an in-progress enumeration held (e.g. an open
    /// directory handle). Always called once the enumerator is exhausted or
    /// abandoned.
    async fn end(&self, root: &Uri);

    async fn monitor_add(&self, dir: &Uri) -> Result<(), Error>;
    async fn monitor_remove(&self, dir: &Uri, recursive: bool, children_only: bool)
        -> Result<(), Error>;
    async fn monitor_move(&self, from: &Uri, to: &Uri) -> Result<(), Error>;
    async fn is_monitored(&self, dir: &Uri) -> bool;
    async fn monitor_count(&self) -> usize;
}

#[cfg(feature = "local-fs")]
pub mod local_fs {
    //! Reference [`DataProvider`] backed by `tokio::fs`, forwarding
    //! `monitor_*` to an embedded [`crate::monitor::notify_monitor::NotifyMonitor`].

    use super::{BeginFlags, DataProvider, Enumerator, FileInfo};
    use crate::error::Error;
    use crate::monitor::notify_monitor::NotifyMonitor;
    use crate::uri::Uri;

    use async_trait::async_trait;
    use std::os::unix::fs::MetadataExt;
    use tokio_stream::wrappers::ReadDirStream;
    use tokio_stream::StreamExt;

    pub struct LocalFsProvider {
        monitor: NotifyMonitor,
    }

    impl LocalFsProvider {
        #[must_use]
        pub fn new(monitor: NotifyMonitor) -> Self {
            Self { monitor }
        }
    }

    #[async_trait]
    impl DataProvider for LocalFsProvider {
        async fn begin(&self, root: &Uri, flags: BeginFlags) -> Result<Enumerator, Error> {
            let path = root.to_path_buf();
            let read_dir = tokio::fs::read_dir(&path)
                .await
                .map_err(|e| Error::io(&path, e))?;

            let no_stat = flags.contains(BeginFlags::NO_STAT);
            let stream = ReadDirStream::new(read_dir).then(move |entry| {
                let no_stat = no_stat;
                let path = path.clone();
                async move {
                    let entry = entry.map_err(|e| Error::io(&path, e))?;
                    let uri = Uri::from_path(entry.path());

                    if no_stat {
                        return Ok(FileInfo {
                            is_dir: false,
                            uri,
                            mtime: None,
                            size: None,
                            inode: None,
                        });
                    }

                    let metadata = entry
                        .metadata()
                        .await
                        .map_err(|e| Error::io(entry.path(), e))?;

                    Ok(FileInfo {
                        is_dir: metadata.is_dir(),
                        uri,
                        mtime: metadata.modified().ok(),
                        size: (!metadata.is_dir()).then_some(metadata.len()),
                        inode: Some(metadata.ino()),
                    })
                }
            });

            Ok(Box::pin(stream))
        }

        async fn end(&self, _root: &Uri) {}

        async fn monitor_add(&self, dir: &Uri) -> Result<(), Error> {
            self.monitor.watch(dir)
        }

        async fn monitor_remove(
            &self,
            dir: &Uri,
            recursive: bool,
            children_only: bool,
        ) -> Result<(), Error> {
            self.monitor.unwatch(dir, recursive, children_only)
        }

        async fn monitor_move(&self, from: &Uri, to: &Uri) -> Result<(), Error> {
            self.monitor.unwatch(from, true, false)?;
            self.monitor.watch(to)
        }

        async fn is_monitored(&self, dir: &Uri) -> bool {
            self.monitor.is_watched(dir)
        }

        async fn monitor_count(&self) -> usize {
            self.monitor.watch_count()
        }
    }
}
