//! The `MinerFS` controller (§4.7): the single owner of queues, pool, roots
//! and phase, driven by one caller turn at a time. There is no internal
//! locking — "single-threaded cooperative event loop" (§5) falls out for
//! free from every method here taking `&mut self` and being `.await`ed in
//! sequence by whichever task owns the [`Controller`]; offloaded I/O
//! (crawling, store queries) is just `.await`ed inline rather than posted
//! back over a channel, since nothing else can observe `self` meanwhile.

pub mod move_resolver;
pub mod state;
pub mod throttle;

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::crawler::Crawler;
use crate::data_provider::DataProvider;
use crate::error::{Error, NonCriticalError, Result};
use crate::extractor::Extractor;
use crate::monitor::MonitorEvent;
use crate::policy::IndexingPolicy;
use crate::pool::{Dispatch, ProcessingPool};
use crate::queues::{PendingItem, WorkQueues};
use crate::retry::{RetryOutcome, RetryTracker};
use crate::rules::IndexerRules;
use crate::store::Store;
use crate::uri::Uri;

use self::move_resolver::MoveResolution;
use self::state::{Phase, ProgressGate, RootEntry, Stats};
use self::throttle::Throttle;

pub struct Controller {
    provider: Arc<dyn DataProvider>,
    store: Arc<dyn Store>,
    rules: IndexerRules,
    monitor_rules: IndexerRules,
    queues: WorkQueues,
    pool: ProcessingPool,
    retry: RetryTracker,
    roots: Vec<RootEntry>,
    phase: Phase,
    stats: Stats,
    throttle: Throttle,
    progress_gate: ProgressGate,
    disable_indexing: bool,
    root_cancel: CancellationToken,
}

impl Controller {
    #[must_use]
    pub fn new(
        config: &Config,
        provider: Arc<dyn DataProvider>,
        store: Arc<dyn Store>,
        extractor: Arc<dyn Extractor>,
        rules: IndexerRules,
        monitor_rules: IndexerRules,
    ) -> Self {
        let roots = config
            .crawl_roots
            .iter()
            .map(|path| RootEntry {
                uri: Uri::from_path(path),
                recurse: true,
                monitor: true,
            })
            .collect();

        Self {
            pool: ProcessingPool::new(config.process_pool_limit, extractor, Arc::clone(&store), config.disable_indexing),
            provider,
            store,
            rules,
            monitor_rules,
            queues: WorkQueues::new(),
            retry: RetryTracker::new(),
            roots,
            phase: Phase::NotStarted,
            stats: Stats::default(),
            throttle: Throttle::new(config.throttle),
            progress_gate: ProgressGate::new(),
            disable_indexing: config.disable_indexing,
            root_cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub fn throttle_interval(&self) -> std::time::Duration {
        self.throttle.interval()
    }

    pub fn set_throttle(&mut self, value: f64) {
        self.throttle.set(value);
    }

    /// Registers a new root and, if the controller has already started,
    /// crawls it immediately (§3, §4.7).
    #[instrument(skip(self), fields(uri = %uri))]
    pub async fn add_root(&mut self, uri: Uri, recurse: bool) -> Result<()> {
        if self.roots.iter().any(|r| r.uri == uri) {
            return Err(Error::RootAlreadyAdded(uri));
        }

        let root = RootEntry { uri: uri.clone(), recurse, monitor: true };
        self.roots.push(root.clone());

        if !matches!(self.phase, Phase::NotStarted) {
            self.crawl_root(&root).await;
            self.phase = Phase::Draining;
        }

        Ok(())
    }

    /// Removes a root: purges queued work under it, cancels in-flight
    /// extractions under it, and drops the watch (§4.5, §4.7, invariant 5).
    #[instrument(skip(self), fields(uri = %uri))]
    pub async fn remove_root(&mut self, uri: &Uri) -> Result<()> {
        let index = self
            .roots
            .iter()
            .position(|r| &r.uri == uri)
            .ok_or_else(|| Error::RootNotFound(uri.clone()))?;
        self.roots.remove(index);

        self.queues.purge_prefix(uri);
        self.retry.purge_prefix(uri);
        self.pool.cancel_prefix(uri);

        if let Err(e) = self.provider.monitor_remove(uri, true, false).await {
            warn!(%uri, error = %e, "failed to remove monitor on root removal");
        }

        self.try_advance_to_idle();
        Ok(())
    }

    /// `start()`: `NotStarted`/`Idle` -> `Crawling`, crawls every registered
    /// root in turn, then moves to `Draining`.
    #[instrument(skip(self))]
    pub async fn start(&mut self) {
        self.phase = Phase::Crawling;
        self.stats.reset_per_crawl();

        let roots = self.roots.clone();
        for root in &roots {
            if self.root_cancel.is_cancelled() {
                break;
            }
            self.crawl_root(root).await;
        }

        self.phase = Phase::Draining;
        info!(files = self.stats.files_found, dirs = self.stats.dirs_found, "crawl complete, draining queues");
        self.try_advance_to_idle();
    }

    async fn crawl_root(&mut self, root: &RootEntry) {
        let policy = IndexingPolicy::new(&self.rules, &self.monitor_rules);
        let crawler = Crawler::new(self.provider.as_ref(), self.store.as_ref(), policy);
        let outcome = crawler.crawl(&root.uri, root.recurse, root.monitor, &self.root_cancel).await;

        if outcome.was_interrupted {
            debug!(uri = %root.uri, "crawl interrupted");
        }

        let mut found = outcome.found;
        self.queues.merge_from(&mut found);
        self.stats.absorb_crawl(outcome.stats);
    }

    pub fn pause(&mut self) {
        self.phase = std::mem::replace(&mut self.phase, Phase::NotStarted).pause();
    }

    pub fn resume(&mut self) {
        self.phase = std::mem::replace(&mut self.phase, Phase::NotStarted).resume();
    }

    /// `stop()`: cancels every in-flight extraction, drops all queued work,
    /// and returns to `Idle`.
    pub fn stop(&mut self) {
        self.root_cancel.cancel();
        self.pool.cancel_all();
        self.queues = WorkQueues::new();
        self.retry = RetryTracker::new();
        self.phase = Phase::Idle;
        self.root_cancel = CancellationToken::new();
    }

    /// Translates one settled monitor signal into a queue mutation,
    /// re-arming the drain phase if the controller had gone `Idle` (§4.2,
    /// §4.7).
    pub fn handle_monitor_event(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::Created { uri, .. } => self.queues.enqueue_created(uri),
            MonitorEvent::Updated { uri, .. } | MonitorEvent::AttributeUpdated { uri, .. } => self.queues.enqueue_updated(uri),
            MonitorEvent::Deleted { uri, .. } => {
                self.retry.clear(&uri);
                self.queues.enqueue_deleted(uri);
            }
            MonitorEvent::Moved { from, to, .. } => self.queues.enqueue_moved(from, to),
        }

        if matches!(self.phase, Phase::Idle) {
            self.phase = Phase::Draining;
        }
    }

    /// Drains as many items as the pool has capacity for, in `D -> C -> U ->
    /// M` order. Returns the number of items dispatched (0 means the pool is
    /// full or every queue is empty).
    #[instrument(skip(self))]
    pub async fn drain_tick(&mut self) -> usize {
        if self.phase.is_paused() {
            return 0;
        }

        for item in self.retry.take_ready(Instant::now()) {
            self.queues.requeue(item);
        }

        let mut dispatched = 0;
        while self.pool.has_capacity() {
            let Some(item) = self.queues.dequeue() else { break };

            if let PendingItem::Moved { from, to } = item {
                self.handle_move(from, to).await;
                dispatched += 1;
                continue;
            }

            if let PendingItem::Deleted(uri) = item {
                self.handle_delete(uri).await;
                dispatched += 1;
                continue;
            }

            match self.pool.dispatch(item, &self.root_cancel).await {
                Dispatch::Full(item) | Dispatch::Locked(item) => {
                    self.queues.requeue(item);
                    break;
                }
                Dispatch::Declined(_) | Dispatch::Accepted(_) => dispatched += 1,
            }
        }

        self.try_advance_to_idle();
        dispatched
    }

    async fn handle_delete(&mut self, uri: Uri) {
        self.pool.cancel_prefix(&uri);
        self.retry.clear(&uri);

        if self.disable_indexing {
            return;
        }

        let batch = format!("DROP GRAPH <{uri}>;\n");
        let cancel = self.root_cancel.child_token();
        if let Err(e) = self.store.batch_update(&batch, &cancel).await {
            warn!(%uri, error = %e, "store rejected delete batch");
        }
    }

    async fn handle_move(&mut self, from: Uri, to: Uri) {
        let to_exists = tokio::fs::try_exists(to.to_path_buf()).await.unwrap_or(false);
        let cancel = self.root_cancel.child_token();

        match move_resolver::resolve(self.store.as_ref(), &from, &to, to_exists, &cancel).await {
            MoveResolution::FallBackToCreate => self.queues.enqueue_created(to),
            MoveResolution::FallBackToDelete => self.handle_delete(from).await,
            MoveResolution::Rewrite(batch) => {
                if !self.disable_indexing {
                    if let Err(e) = self.store.batch_update(&batch, &cancel).await {
                        warn!(%from, %to, error = %e, "store rejected move rewrite batch");
                    }
                }
                self.retry.clear(&from);
            }
        }
    }

    /// The extractor's out-of-band completion callback (§4.6 step 6),
    /// forwarded to the pool. Transient I/O failures are retried with
    /// backoff (§7): held back from the queues until `next_attempt_at`
    /// passes (`drain_tick` re-queues them), then re-queued into the kind
    /// they originally failed from rather than always as an update.
    /// Everything else is final.
    #[instrument(skip(self), fields(uri = %uri))]
    pub async fn notify_file(&mut self, uri: &Uri, error: Option<NonCriticalError>) {
        let transient = matches!(error, Some(ref e) if e.is_transient());
        let result = self.pool.notify_file(uri, error).await;

        if let Err(failure) = result {
            if transient {
                match self.retry.record_failure(uri, Instant::now()) {
                    RetryOutcome::Retry => self.retry.schedule_retry(uri, failure.kind),
                    RetryOutcome::Exhausted => warn!(%uri, "transient error exhausted retry budget"),
                }
            } else {
                debug!(%uri, error = %failure.error, "extraction completed with a non-transient error");
            }
        } else {
            self.retry.clear(uri);
        }

        self.try_advance_to_idle();
    }

    fn try_advance_to_idle(&mut self) {
        if matches!(self.phase, Phase::Draining)
            && self.queues.is_empty()
            && self.pool.is_empty()
            && !self.retry.has_delayed()
        {
            self.phase = Phase::Idle;
            info!("queues and pool drained, controller idle");
        }
    }

    /// `(items_total - items_pending) / items_total` (§4.7), rate-limited to
    /// at most one report per wall-second (invariant 6).
    pub fn progress(&mut self, now: Instant) -> Option<f64> {
        let total = self.stats.items_total();
        if total == 0 {
            return self.progress_gate.try_report(now, 1.0);
        }

        let pending = self.queues.len() + self.pool.len() + self.retry.delayed_len();
        let progress = (total.saturating_sub(pending)) as f64 / total as f64;
        self.progress_gate.try_report(now, progress)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.root_cancel.cancel();
    }
}
