//! Bounded concurrent extraction (§4.6).
//!
//! Holds the `InFlight` set described in §3: at most `pool_limit` URIs are
//! ever mid-extraction at once, admission is checked with a strict `<`
//! before insertion (§9's resolved Open Question), and every entry's
//! [`Builder`] is forwarded to the [`Store`] as a single idempotent batch on
//! completion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::NonCriticalError;
use crate::extractor::Extractor;
use crate::monitor::is_locked_name;
use crate::queues::PendingItem;
use crate::store::{Builder, Store};
use crate::uri::Uri;

struct InFlightEntry {
    cancel: CancellationToken,
    builder: Builder,
    started_at: Instant,
    /// The item's original kind (`Created` or `Updated`), so a transient
    /// failure can be re-queued into the queue it actually came from (§7)
    /// instead of always landing on Updated.
    kind: PendingItem,
}

/// The outcome of attempting to dispatch one [`PendingItem`].
#[derive(Debug)]
pub enum Dispatch {
    /// The pool was at capacity; the caller must re-push `item` and try
    /// again once a slot frees up.
    Full(PendingItem),
    /// The path looked locked (editor swap file, partial download, ...) at
    /// dispatch time; the caller must re-push `item` to its queue's tail and
    /// yield the rest of this tick (§4.6 step 2).
    Locked(PendingItem),
    /// The extractor declined the file synchronously; nothing further to do.
    Declined(Uri),
    /// The extractor accepted the file; completion will arrive through
    /// [`ProcessingPool::notify_file`].
    Accepted(Uri),
}

/// A failed completion paired with the item's original kind, so the caller
/// can re-queue a retried item without downgrading `Created` to `Updated`.
#[derive(Debug)]
pub struct NotifyFailure {
    pub error: NonCriticalError,
    pub kind: PendingItem,
}

pub struct ProcessingPool {
    pool_limit: usize,
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn Store>,
    disable_indexing: bool,
    in_flight: HashMap<Uri, InFlightEntry>,
}

impl ProcessingPool {
    #[must_use]
    pub fn new(pool_limit: usize, extractor: Arc<dyn Extractor>, store: Arc<dyn Store>, disable_indexing: bool) -> Self {
        Self {
            pool_limit: pool_limit.max(1),
            extractor,
            store,
            disable_indexing,
            in_flight: HashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.in_flight.len() < self.pool_limit
    }

    #[must_use]
    pub fn is_in_flight(&self, uri: &Uri) -> bool {
        self.in_flight.contains_key(uri)
    }

    /// Attempts to dispatch `item` against the extractor. Admission is
    /// checked strictly before insertion: a pool already at `pool_limit`
    /// refuses and hands the item back (§9).
    #[instrument(skip(self, parent_cancel), fields(uri = %item.dispatch_uri()))]
    pub async fn dispatch(&mut self, item: PendingItem, parent_cancel: &CancellationToken) -> Dispatch {
        if !self.has_capacity() {
            return Dispatch::Full(item);
        }

        if is_locked_name(item.dispatch_uri().display_name()) {
            debug!(uri = %item.dispatch_uri(), "path-locked at dispatch time, requeuing");
            return Dispatch::Locked(item);
        }

        let kind = item.clone();
        let uri = item.dispatch_uri().clone();
        let cancel = parent_cancel.child_token();
        let mut builder = Builder::new();

        let accepted = self.extractor.process_file(&uri, &mut builder, &cancel).await;

        if !accepted {
            debug!(%uri, "extractor declined file");
            return Dispatch::Declined(uri);
        }

        info!(%uri, "extraction accepted");
        self.in_flight.insert(
            uri.clone(),
            InFlightEntry {
                cancel,
                builder,
                started_at: Instant::now(),
                kind,
            },
        );
        Dispatch::Accepted(uri)
    }

    /// Completion callback the extractor drives once it's done with `uri`
    /// (§4.6 step 6). `NotFound` is logged at info and dropped; any other
    /// error is logged critical; both still release the pool slot. On
    /// success the builder's statements are forwarded to the store as one
    /// `DROP GRAPH`-prefixed batch, unless `disable_indexing` is set.
    #[instrument(skip(self), fields(uri = %uri))]
    pub async fn notify_file(&mut self, uri: &Uri, error: Option<NonCriticalError>) -> Result<(), NotifyFailure> {
        let Some(entry) = self.in_flight.remove(uri) else {
            warn!(%uri, "notify_file for a URI with no in-flight entry");
            return Err(NotifyFailure {
                error: NonCriticalError::Programming {
                    uri: uri.clone(),
                    kind: "notify_file",
                    message: "called without a matching accepted process_file".to_string(),
                },
                // Never consulted: Programming errors aren't transient, so
                // nothing re-queues this kind.
                kind: PendingItem::Updated(uri.clone()),
            });
        };

        if let Some(err) = error {
            match &err {
                NonCriticalError::NotFound(_) => info!(%uri, "file vanished before extraction completed"),
                NonCriticalError::Cancelled(_) => debug!(%uri, "extraction cancelled"),
                other => error!(%uri, error = %other, "extraction failed"),
            }
            return Err(NotifyFailure { error: err, kind: entry.kind });
        }

        if self.disable_indexing || entry.builder.is_empty() {
            debug!(%uri, elapsed = ?entry.started_at.elapsed(), "no store write needed");
            return Ok(());
        }

        let batch = entry.builder.into_batch(uri);
        self.store
            .batch_update(&batch, &entry.cancel)
            .await
            .map_err(|e| NotifyFailure {
                error: NonCriticalError::Store {
                    uri: uri.clone(),
                    message: e.to_string(),
                },
                kind: entry.kind.clone(),
            })?;

        debug!(%uri, elapsed = ?entry.started_at.elapsed(), "extraction committed");
        Ok(())
    }

    /// Trips the cancel token of every in-flight extraction whose URI is
    /// equal to or nested under `root`, used by `remove_root`/`stop` (§4.5,
    /// §5). Does not remove the entries — completion still arrives through
    /// `notify_file` once the extractor observes the cancellation.
    pub fn cancel_prefix(&self, root: &Uri) {
        for (uri, entry) in &self.in_flight {
            if uri.is_prefixed_by(root) {
                entry.cancel.cancel();
            }
        }
    }

    pub fn cancel_all(&self) {
        for entry in self.in_flight.values() {
            entry.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{AcceptAllExtractor, NoopExtractor};
    use crate::store::InMemoryStore;

    fn pool(limit: usize, extractor: Arc<dyn Extractor>) -> ProcessingPool {
        ProcessingPool::new(limit, extractor, Arc::new(InMemoryStore::new()), false)
    }

    #[tokio::test]
    async fn declined_file_never_occupies_a_slot() {
        let mut pool = pool(1, Arc::new(NoopExtractor));
        let cancel = CancellationToken::new();
        let outcome = pool
            .dispatch(PendingItem::Created(Uri::from_path("/data/a.txt")), &cancel)
            .await;
        assert!(matches!(outcome, Dispatch::Declined(_)));
        assert_eq!(pool.len(), 0);
    }

    #[tokio::test]
    async fn accepted_file_occupies_a_slot_until_notified() {
        let mut pool = pool(1, Arc::new(AcceptAllExtractor));
        let cancel = CancellationToken::new();
        let uri = Uri::from_path("/data/a.txt");
        let outcome = pool.dispatch(PendingItem::Created(uri.clone()), &cancel).await;
        assert!(matches!(outcome, Dispatch::Accepted(_)));
        assert_eq!(pool.len(), 1);

        pool.notify_file(&uri, None).await.unwrap();
        assert_eq!(pool.len(), 0);
    }

    #[tokio::test]
    async fn full_pool_hands_the_item_back() {
        let mut pool = pool(1, Arc::new(AcceptAllExtractor));
        let cancel = CancellationToken::new();
        let a = Uri::from_path("/data/a.txt");
        let b = Uri::from_path("/data/b.txt");

        pool.dispatch(PendingItem::Created(a), &cancel).await;
        let outcome = pool.dispatch(PendingItem::Created(b.clone()), &cancel).await;
        assert!(matches!(outcome, Dispatch::Full(PendingItem::Created(u)) if u == b));
    }

    #[tokio::test]
    async fn cancel_prefix_trips_in_flight_tokens_under_root() {
        let mut pool = pool(2, Arc::new(AcceptAllExtractor));
        let cancel = CancellationToken::new();
        let uri = Uri::from_path("/data/sub/a.txt");
        pool.dispatch(PendingItem::Created(uri.clone()), &cancel).await;

        pool.cancel_prefix(&Uri::from_path("/data"));

        assert!(pool.in_flight.get(&uri).unwrap().cancel.is_cancelled());
    }

    #[tokio::test]
    async fn locked_path_is_handed_back_without_occupying_a_slot() {
        let mut pool = pool(1, Arc::new(AcceptAllExtractor));
        let cancel = CancellationToken::new();
        let uri = Uri::from_path("/data/download.part");

        let outcome = pool.dispatch(PendingItem::Created(uri.clone()), &cancel).await;
        assert!(matches!(outcome, Dispatch::Locked(PendingItem::Created(u)) if u == uri));
        assert_eq!(pool.len(), 0);
    }

    #[tokio::test]
    async fn transient_failure_reports_the_original_kind() {
        let mut pool = pool(1, Arc::new(AcceptAllExtractor));
        let cancel = CancellationToken::new();
        let uri = Uri::from_path("/data/a.txt");
        pool.dispatch(PendingItem::Created(uri.clone()), &cancel).await;

        let failure = pool
            .notify_file(&uri, Some(NonCriticalError::IoTransient { uri: uri.clone(), message: "EMFILE".into() }))
            .await
            .unwrap_err();
        assert!(matches!(failure.kind, PendingItem::Created(u) if u == uri));
    }

    #[tokio::test]
    async fn not_found_error_is_dropped_without_store_write() {
        let mut pool = pool(1, Arc::new(AcceptAllExtractor));
        let cancel = CancellationToken::new();
        let uri = Uri::from_path("/data/a.txt");
        pool.dispatch(PendingItem::Created(uri.clone()), &cancel).await;

        let result = pool.notify_file(&uri, Some(NonCriticalError::NotFound(uri.clone()))).await;
        assert!(result.is_err());
        assert_eq!(pool.len(), 0);
    }
}
