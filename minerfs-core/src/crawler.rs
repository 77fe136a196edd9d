//! Depth-bounded directory walk over a [`DataProvider`] (§4.3).
//!
//! Children are visited depth-first, sorted byte-wise by path so test runs
//! are deterministic. Per-entry accept/descend decisions are delegated to an
//! [`IndexingPolicy`]; the walk itself only owns traversal order, statistics,
//! and cancellation.

use futures::future::BoxFuture;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::data_provider::{BeginFlags, DataProvider, FileInfo};
use crate::policy::IndexingPolicy;
use crate::queues::WorkQueues;
use crate::store::Store;
use crate::uri::Uri;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CrawlStats {
    pub dirs_found: usize,
    pub dirs_ignored: usize,
    pub files_found: usize,
    pub files_ignored: usize,
}

/// A completed (or interrupted) crawl: the discovered items, ready to be
/// merged into the controller's own [`WorkQueues`], plus terminal stats
/// (`finished(...)`, §4.3).
pub struct CrawlOutcome {
    pub found: WorkQueues,
    pub stats: CrawlStats,
    pub was_interrupted: bool,
}

pub struct Crawler<'a> {
    provider: &'a dyn DataProvider,
    store: &'a dyn Store,
    policy: IndexingPolicy<'a>,
}

impl<'a> Crawler<'a> {
    #[must_use]
    pub fn new(provider: &'a dyn DataProvider, store: &'a dyn Store, policy: IndexingPolicy<'a>) -> Self {
        Self { provider, store, policy }
    }

    /// Walks `root`, recursing into subdirectories when `recurse` is set and
    /// installing a monitor on each accepted directory when `install_monitor`
    /// is set. Consults `cancel` between entries so a `stop()`/`remove_root`
    /// can interrupt a crawl promptly (§5).
    #[instrument(skip(self, cancel), fields(root = %root))]
    pub async fn crawl(&self, root: &Uri, recurse: bool, install_monitor: bool, cancel: &CancellationToken) -> CrawlOutcome {
        let mut found = WorkQueues::new();
        let mut stats = CrawlStats::default();
        let was_interrupted = self
            .walk(root, recurse, install_monitor, true, cancel, &mut found, &mut stats)
            .await;
        CrawlOutcome {
            found,
            stats,
            was_interrupted,
        }
    }

    fn walk<'b>(
        &'b self,
        dir: &'b Uri,
        recurse: bool,
        install_monitor: bool,
        is_root: bool,
        cancel: &'b CancellationToken,
        found: &'b mut WorkQueues,
        stats: &'b mut CrawlStats,
    ) -> BoxFuture<'b, bool> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return true;
            }

            let entries = match self.list_children(dir).await {
                Some(entries) => entries,
                None => return false,
            };

            let children_names: Vec<String> = entries.iter().map(|e| e.uri.display_name().to_string()).collect();

            // check-directory-contents only ever gates descendants (§4.3, §9).
            if !is_root && !self.policy.check_directory_contents(&children_names) {
                stats.dirs_ignored += 1;
                return false;
            }

            for entry in entries {
                if cancel.is_cancelled() {
                    return true;
                }

                if entry.is_dir {
                    if self.visit_dir(&entry, install_monitor, found, stats).await && recurse {
                        let interrupted = self.walk(&entry.uri, recurse, install_monitor, false, cancel, found, stats).await;
                        if interrupted {
                            return true;
                        }
                    }
                } else {
                    self.visit_file(&entry, found, stats).await;
                }
            }

            false
        })
    }

    async fn list_children(&self, dir: &Uri) -> Option<Vec<FileInfo>> {
        let mut enumerator = match self.provider.begin(dir, BeginFlags::empty()).await {
            Ok(e) => e,
            Err(e) => {
                warn!(%dir, error = %e, "crawl failed to enumerate directory, skipping");
                return None;
            }
        };

        let mut entries = Vec::new();
        while let Some(result) = enumerator.next().await {
            match result {
                Ok(info) => entries.push(info),
                Err(e) => warn!(%dir, error = %e, "crawl skipped an unreadable entry"),
            }
        }
        self.provider.end(dir).await;

        entries.sort_by(|a, b| a.uri.as_str().cmp(b.uri.as_str()));
        Some(entries)
    }

    /// Returns whether the directory was accepted (and thus should be
    /// recursed into when `recurse` is set).
    async fn visit_dir(&self, entry: &FileInfo, install_monitor: bool, found: &mut WorkQueues, stats: &mut CrawlStats) -> bool {
        if !self.policy.should_check(&entry.uri, true) {
            stats.dirs_ignored += 1;
            return false;
        }

        stats.dirs_found += 1;

        // should_change_index false => ignore_mark: still walked, not enqueued.
        if self.policy.should_change_index(self.store, &entry.uri, entry.mtime).await {
            found.enqueue_created(entry.uri.clone());
        }

        if install_monitor && self.policy.should_monitor(&entry.uri) {
            if let Err(e) = self.provider.monitor_add(&entry.uri).await {
                warn!(uri = %entry.uri, error = %e, "failed to install monitor during crawl");
            }
        }

        true
    }

    async fn visit_file(&self, entry: &FileInfo, found: &mut WorkQueues, stats: &mut CrawlStats) {
        if !self.policy.should_check(&entry.uri, false) {
            stats.files_ignored += 1;
            return;
        }

        stats.files_found += 1;

        if self.policy.should_change_index(self.store, &entry.uri, entry.mtime).await {
            found.enqueue_created(entry.uri.clone());
        }
    }
}
