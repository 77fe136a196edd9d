//! The four ordered work queues (§4.5).
//!
//! Deleted, Created, Updated and Moved items each live in their own FIFO,
//! drained in strict `D -> C -> U -> M` order. A `Uri`'s current queue (if
//! any) is tracked in a side table so enqueue-time dedup (the table in §4.5)
//! is O(1) rather than a linear scan of four deques.

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::uri::Uri;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingItem {
    Created(Uri),
    Updated(Uri),
    Deleted(Uri),
    Moved { from: Uri, to: Uri },
}

impl PendingItem {
    /// The URI the pool should dispatch against. For `Moved`, that's the
    /// destination — resolving `from`'s prior identity is the move
    /// resolver's job (§4.7), not the queue's.
    #[must_use]
    pub fn dispatch_uri(&self) -> &Uri {
        match self {
            Self::Created(uri) | Self::Updated(uri) | Self::Deleted(uri) => uri,
            Self::Moved { to, .. } => to,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Deleted,
    Created,
    Updated,
    Moved,
}

#[derive(Default)]
pub struct WorkQueues {
    deleted: VecDeque<Uri>,
    created: VecDeque<Uri>,
    updated: VecDeque<Uri>,
    moved: VecDeque<(Uri, Uri)>,
    /// Where a given URI currently sits, if anywhere. Moved entries are
    /// indexed under both their `from` and `to` URIs.
    location: HashMap<Uri, Slot>,
}

impl WorkQueues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty()
            && self.created.is_empty()
            && self.updated.is_empty()
            && self.moved.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deleted.len() + self.created.len() + self.updated.len() + self.moved.len()
    }

    /// Removes any queued entry for `uri`, wherever it sits. Used both by
    /// the dedup table (§4.5) and by root removal (purging a whole subtree).
    fn remove(&mut self, uri: &Uri) {
        match self.location.remove(uri) {
            Some(Slot::Deleted) => self.deleted.retain(|u| u != uri),
            Some(Slot::Created) => self.created.retain(|u| u != uri),
            Some(Slot::Updated) => self.updated.retain(|u| u != uri),
            Some(Slot::Moved) => {
                self.moved.retain(|(from, to)| {
                    let keep = from != uri && to != uri;
                    if !keep {
                        self.location.remove(if from == uri { to } else { from });
                    }
                    keep
                });
            }
            None => {}
        }
    }

    pub fn enqueue_created(&mut self, uri: Uri) {
        if matches!(self.location.get(&uri), Some(Slot::Created)) {
            trace!(%uri, "created: already queued, no-op");
            return;
        }
        self.remove(&uri);
        self.push_created(uri);
    }

    pub fn enqueue_updated(&mut self, uri: Uri) {
        match self.location.get(&uri) {
            Some(Slot::Created) => {
                trace!(%uri, "updated: created already queued, created wins");
            }
            Some(Slot::Updated) => {
                trace!(%uri, "updated: already queued, no-op");
            }
            Some(Slot::Deleted | Slot::Moved) | None => {
                self.remove(&uri);
                self.updated.push_back(uri.clone());
                self.location.insert(uri, Slot::Updated);
            }
        }
    }

    pub fn enqueue_deleted(&mut self, uri: Uri) {
        self.remove(&uri);
        self.deleted.push_back(uri.clone());
        self.location.insert(uri, Slot::Deleted);
    }

    pub fn enqueue_moved(&mut self, from: Uri, to: Uri) {
        self.remove(&from);
        self.remove(&to);
        self.moved.push_back((from.clone(), to.clone()));
        self.location.insert(from, Slot::Moved);
        self.location.insert(to, Slot::Moved);
    }

    fn push_created(&mut self, uri: Uri) {
        self.created.push_back(uri.clone());
        self.location.insert(uri, Slot::Created);
    }

    /// Pops the next item to dispatch per the fixed `D -> C -> U -> M`
    /// drain priority (§4.5, invariant 3).
    pub fn dequeue(&mut self) -> Option<PendingItem> {
        if let Some(uri) = self.deleted.pop_front() {
            self.location.remove(&uri);
            return Some(PendingItem::Deleted(uri));
        }
        if let Some(uri) = self.created.pop_front() {
            self.location.remove(&uri);
            return Some(PendingItem::Created(uri));
        }
        if let Some(uri) = self.updated.pop_front() {
            self.location.remove(&uri);
            return Some(PendingItem::Updated(uri));
        }
        if let Some((from, to)) = self.moved.pop_front() {
            self.location.remove(&from);
            self.location.remove(&to);
            return Some(PendingItem::Moved { from, to });
        }
        None
    }

    /// Re-pushes an item the pool couldn't admit (full) or that was
    /// path-locked at dispatch time, to the tail of its own queue (§4.6 step
    /// 2). Bypasses dedup: the item was just dequeued from here, so it
    /// cannot already be present elsewhere.
    pub fn requeue(&mut self, item: PendingItem) {
        match item {
            PendingItem::Deleted(uri) => {
                self.deleted.push_back(uri.clone());
                self.location.insert(uri, Slot::Deleted);
            }
            PendingItem::Created(uri) => self.push_created(uri),
            PendingItem::Updated(uri) => {
                self.updated.push_back(uri.clone());
                self.location.insert(uri, Slot::Updated);
            }
            PendingItem::Moved { from, to } => {
                self.moved.push_back((from.clone(), to.clone()));
                self.location.insert(from, Slot::Moved);
                self.location.insert(to, Slot::Moved);
            }
        }
    }

    /// Drains every item out of `other` and re-enqueues it here, applying
    /// this queue's own dedup rules (used to merge a crawl's discovered
    /// items into the controller's live queues).
    pub fn merge_from(&mut self, other: &mut Self) {
        while let Some(item) = other.dequeue() {
            match item {
                PendingItem::Created(uri) => self.enqueue_created(uri),
                PendingItem::Updated(uri) => self.enqueue_updated(uri),
                PendingItem::Deleted(uri) => self.enqueue_deleted(uri),
                PendingItem::Moved { from, to } => self.enqueue_moved(from, to),
            }
        }
    }

    /// Purges every queued entry whose URI equals or is nested under `root`
    /// (`remove_root`, §4.5/§4.7).
    pub fn purge_prefix(&mut self, root: &Uri) {
        let affected: Vec<Uri> = self
            .location
            .keys()
            .filter(|uri| uri.is_prefixed_by(root))
            .cloned()
            .collect();
        for uri in affected {
            self.remove(&uri);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        Uri::from_path(s)
    }

    #[test]
    fn drain_priority_is_deleted_created_updated_moved() {
        let mut q = WorkQueues::new();
        q.enqueue_moved(uri("/a/from"), uri("/a/to"));
        q.enqueue_updated(uri("/u"));
        q.enqueue_created(uri("/c"));
        q.enqueue_deleted(uri("/d"));

        assert_eq!(q.dequeue(), Some(PendingItem::Deleted(uri("/d"))));
        assert_eq!(q.dequeue(), Some(PendingItem::Created(uri("/c"))));
        assert_eq!(q.dequeue(), Some(PendingItem::Updated(uri("/u"))));
        assert_eq!(
            q.dequeue(),
            Some(PendingItem::Moved {
                from: uri("/a/from"),
                to: uri("/a/to")
            })
        );
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn created_after_updated_removes_update_entry() {
        let mut q = WorkQueues::new();
        q.enqueue_updated(uri("/u"));
        q.enqueue_created(uri("/u"));
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue(), Some(PendingItem::Created(uri("/u"))));
    }

    #[test]
    fn updated_after_created_is_a_no_op() {
        let mut q = WorkQueues::new();
        q.enqueue_created(uri("/u"));
        q.enqueue_updated(uri("/u"));
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue(), Some(PendingItem::Created(uri("/u"))));
    }

    #[test]
    fn deleted_cancels_queued_created_or_updated() {
        let mut q = WorkQueues::new();
        q.enqueue_created(uri("/u"));
        q.enqueue_deleted(uri("/u"));
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue(), Some(PendingItem::Deleted(uri("/u"))));
    }

    #[test]
    fn created_then_deleted_round_trip_ends_empty() {
        let mut q = WorkQueues::new();
        q.enqueue_created(uri("/u"));
        q.enqueue_deleted(uri("/u"));
        let _ = q.dequeue();
        assert!(q.is_empty());
    }

    #[test]
    fn moved_purges_pending_entries_for_either_endpoint() {
        let mut q = WorkQueues::new();
        q.enqueue_updated(uri("/b"));
        q.enqueue_moved(uri("/a"), uri("/b"));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn uri_never_appears_in_more_than_one_queue() {
        let mut q = WorkQueues::new();
        let u = uri("/x");
        q.enqueue_created(u.clone());
        q.enqueue_updated(u.clone());
        q.enqueue_created(u.clone());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn purge_prefix_removes_whole_subtree() {
        let mut q = WorkQueues::new();
        q.enqueue_created(uri("/data/a.txt"));
        q.enqueue_updated(uri("/data/sub/b.txt"));
        q.enqueue_deleted(uri("/other/c.txt"));
        q.purge_prefix(&uri("/data"));
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue(), Some(PendingItem::Deleted(uri("/other/c.txt"))));
    }

    #[test]
    fn requeue_puts_item_back_at_the_tail_of_its_own_kind() {
        let mut q = WorkQueues::new();
        q.enqueue_created(uri("/a"));
        let item = q.dequeue().unwrap();
        q.enqueue_updated(uri("/b"));
        q.requeue(item);
        assert_eq!(q.dequeue(), Some(PendingItem::Updated(uri("/b"))));
        assert_eq!(q.dequeue(), Some(PendingItem::Created(uri("/a"))));
    }

    #[test]
    fn merge_from_applies_dedup_rules_of_the_destination() {
        let mut dest = WorkQueues::new();
        let mut src = WorkQueues::new();
        dest.enqueue_updated(uri("/a"));
        src.enqueue_created(uri("/a"));
        src.enqueue_created(uri("/b"));

        dest.merge_from(&mut src);

        assert!(src.is_empty());
        assert_eq!(dest.len(), 2);
        assert_eq!(dest.dequeue(), Some(PendingItem::Created(uri("/a"))));
        assert_eq!(dest.dequeue(), Some(PendingItem::Created(uri("/b"))));
    }
}
