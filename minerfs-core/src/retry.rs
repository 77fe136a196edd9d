//! Per-URI retry bookkeeping for transient I/O errors (§3, §7).
//!
//! Kept outside the four work queues deliberately: a [`PendingItem`] carries
//! no attempt count, so a retried item is indistinguishable from a fresh one
//! once it's back in a queue. The controller consults this side table when it
//! dispatches, and pushes an item back onto its origin queue only once
//! `next_attempt_at` has passed.
//!
//! [`PendingItem`]: crate::queues::PendingItem

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::queues::PendingItem;
use crate::uri::Uri;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct RetryState {
    attempts: u32,
    next_attempt_at: Instant,
}

impl RetryState {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn is_ready(&self, now: Instant) -> bool {
        now >= self.next_attempt_at
    }
}

/// Whether a retry attempt should proceed or has exhausted its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Re-queue and try again once `next_attempt_at` has passed.
    Retry,
    /// Retry budget exhausted; demote to `IoPermanent` (§7).
    Exhausted,
}

/// Tracks outstanding transient-failure retries, keyed by URI.
#[derive(Default)]
pub struct RetryTracker {
    states: HashMap<Uri, RetryState>,
    /// Items held back after a `Retry` outcome, waiting for their
    /// `next_attempt_at` to pass before `drain_tick` re-queues them (§7).
    delayed: HashMap<Uri, (Instant, PendingItem)>,
}

impl RetryTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a transient failure for `uri`, returning whether it should be
    /// retried (with exponential backoff doubling from 100ms, capped at 10s)
    /// or has exhausted its 5-attempt budget.
    pub fn record_failure(&mut self, uri: &Uri, now: Instant) -> RetryOutcome {
        let state = self.states.entry(uri.clone()).or_insert(RetryState {
            attempts: 0,
            next_attempt_at: now,
        });
        state.attempts += 1;

        if state.attempts > MAX_ATTEMPTS {
            warn!(%uri, attempts = state.attempts, "retry budget exhausted, demoting to permanent");
            self.states.remove(uri);
            return RetryOutcome::Exhausted;
        }

        let backoff = INITIAL_BACKOFF
            .saturating_mul(1 << (state.attempts - 1).min(31))
            .min(MAX_BACKOFF);
        state.next_attempt_at = now + backoff;
        debug!(%uri, attempts = state.attempts, ?backoff, "scheduling retry");
        RetryOutcome::Retry
    }

    /// Clears retry state for `uri` after a successful attempt or permanent
    /// drop, so a later fresh failure starts its own backoff from scratch.
    pub fn clear(&mut self, uri: &Uri) {
        self.states.remove(uri);
        self.delayed.remove(uri);
    }

    #[must_use]
    pub fn state(&self, uri: &Uri) -> Option<&RetryState> {
        self.states.get(uri)
    }

    /// Holds `kind` back from the queues until `uri`'s `next_attempt_at` has
    /// passed, per the backoff scheduled by the most recent
    /// [`Self::record_failure`] call. `drain_tick` calls [`Self::take_ready`]
    /// each tick to re-queue whatever has become due.
    pub fn schedule_retry(&mut self, uri: &Uri, kind: PendingItem) {
        let ready_at = self
            .states
            .get(uri)
            .map_or_else(Instant::now, |s| s.next_attempt_at);
        self.delayed.insert(uri.clone(), (ready_at, kind));
    }

    /// Removes and returns every delayed item whose backoff has elapsed by
    /// `now`, in no particular order — re-queueing restores FIFO ordering
    /// within the destination queue the same way any other late arrival
    /// would.
    pub fn take_ready(&mut self, now: Instant) -> Vec<PendingItem> {
        let ready: Vec<Uri> = self
            .delayed
            .iter()
            .filter(|(_, (ready_at, _))| now >= *ready_at)
            .map(|(uri, _)| uri.clone())
            .collect();
        ready
            .into_iter()
            .filter_map(|uri| self.delayed.remove(&uri).map(|(_, kind)| kind))
            .collect()
    }

    #[must_use]
    pub fn has_delayed(&self) -> bool {
        !self.delayed.is_empty()
    }

    #[must_use]
    pub fn delayed_len(&self) -> usize {
        self.delayed.len()
    }

    /// Purges retry state for every URI under `root`, mirroring
    /// [`crate::queues::WorkQueues::purge_prefix`] on root removal.
    pub fn purge_prefix(&mut self, root: &Uri) {
        self.states.retain(|uri, _| !uri.is_prefixed_by(root));
        self.delayed.retain(|uri, _| !uri.is_prefixed_by(root));
    }
}
