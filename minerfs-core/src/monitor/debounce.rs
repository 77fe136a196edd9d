//! Quiet-window coalescing for raw filesystem events (§4.2).
//!
//! Multiple writes to the same file within `quiet_window` collapse to a
//! single `item-updated`; a create immediately followed by an update for the
//! same URI within the window collapses to `item-created`. This is plain
//! state tracked per-URI — no task or timer is spawned per event, the
//! controller's queue handler ticks frequently enough (every throttle
//! interval, at most `MAX_THROTTLE_INTERVAL`) to flush settled entries.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::monitor::MonitorEvent;
use crate::uri::Uri;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Created,
    Updated,
}

struct PendingEntry {
    kind: PendingKind,
    is_dir: bool,
    last_seen: Instant,
}

/// Coalesces a stream of raw create/update events into settled
/// [`MonitorEvent`]s. Deletes, attribute updates and moves pass through
/// immediately — only create/update bursts need a quiet window, per §4.2.
pub struct Debouncer {
    quiet_window: Duration,
    pending: HashMap<Uri, PendingEntry>,
}

impl Debouncer {
    #[must_use]
    pub fn new(quiet_window: Duration) -> Self {
        Self {
            quiet_window,
            pending: HashMap::new(),
        }
    }

    /// Feeds one raw create/update event. Returns `true` once merged into
    /// the pending state; call [`Debouncer::drain_settled`] on a timer to
    /// flush entries whose quiet window has elapsed.
    pub fn record_create(&mut self, uri: Uri, is_dir: bool) {
        self.pending.insert(
            uri,
            PendingEntry {
                kind: PendingKind::Created,
                is_dir,
                last_seen: Instant::now(),
            },
        );
    }

    pub fn record_update(&mut self, uri: Uri, is_dir: bool) {
        self.pending
            .entry(uri)
            .and_modify(|entry| entry.last_seen = Instant::now())
            .or_insert_with(|| PendingEntry {
                kind: PendingKind::Updated,
                is_dir,
                last_seen: Instant::now(),
            });
    }

    /// Removes any pending entry for `uri` without emitting it — used when a
    /// delete or move event supersedes an in-flight create/update burst.
    pub fn cancel(&mut self, uri: &Uri) {
        self.pending.remove(uri);
    }

    /// Drains every entry whose quiet window has elapsed, emitting it as a
    /// settled [`MonitorEvent`].
    pub fn drain_settled(&mut self) -> Vec<MonitorEvent> {
        let now = Instant::now();
        let settled: Vec<Uri> = self
            .pending
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_seen) >= self.quiet_window)
            .map(|(uri, _)| uri.clone())
            .collect();

        settled
            .into_iter()
            .filter_map(|uri| {
                self.pending.remove(&uri).map(|entry| match entry.kind {
                    PendingKind::Created => MonitorEvent::Created {
                        uri,
                        is_dir: entry.is_dir,
                    },
                    PendingKind::Updated => MonitorEvent::Updated {
                        uri,
                        is_dir: entry.is_dir,
                    },
                })
            })
            .collect()
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
