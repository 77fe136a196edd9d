//! Reference [`Monitor`]-role implementation backed by the `notify` crate.
//!
//! Grounded in the teacher's `sd-fs-watcher`/vendored `notify` crate: OS
//! events arrive on a synchronous callback, get forwarded onto a `tokio`
//! channel, and are translated + debounced into [`MonitorEvent`]s here
//! before reaching the controller's monitor queue.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{is_locked_name, MonitorEvent};
use crate::error::Error;
use crate::uri::Uri;

/// Owns the set of watched directories and the underlying OS watcher. Raw
/// `notify::Event`s are pushed onto `raw_tx`; call [`NotifyMonitor::events`]
/// once to take the receiver side and drive translation.
pub struct NotifyMonitor {
    watcher: Mutex<RecommendedWatcher>,
    watched: Arc<Mutex<HashSet<Uri>>>,
    raw_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

impl NotifyMonitor {
    /// Builds a monitor whose OS watcher forwards every raw event onto an
    /// internal channel. The synchronous `notify` callback never blocks: it
    /// does a non-blocking `send` onto an unbounded channel and returns.
    pub fn new() -> Result<Self, Error> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if raw_tx.send(event).is_err() {
                        debug!("monitor event dropped: receiver gone");
                    }
                }
                Err(e) => warn!(error = %e, "notify watcher reported an error"),
            },
            notify::Config::default(),
        )
        .map_err(|e| Error::Monitor(e.to_string()))?;

        Ok(Self {
            watcher: Mutex::new(watcher),
            watched: Arc::new(Mutex::new(HashSet::new())),
            raw_rx: Mutex::new(Some(raw_rx)),
        })
    }

    pub fn watch(&self, dir: &Uri) -> Result<(), Error> {
        let mut watched = self.watched.lock().expect("watch set poisoned");
        if watched.contains(dir) {
            return Ok(()); // idempotent, per §4.2
        }

        self.watcher
            .lock()
            .expect("watcher poisoned")
            .watch(dir.path(), RecursiveMode::NonRecursive)
            .map_err(|e| Error::Monitor(e.to_string()))?;

        watched.insert(dir.clone());
        Ok(())
    }

    pub fn unwatch(&self, dir: &Uri, recursive: bool, children_only: bool) -> Result<(), Error> {
        let mut watched = self.watched.lock().expect("watch set poisoned");

        if !children_only {
            if watched.remove(dir) {
                let _ = self.watcher.lock().expect("watcher poisoned").unwatch(dir.path());
            }
        }

        if recursive {
            let descendants: Vec<Uri> = watched
                .iter()
                .filter(|w| *w != dir && w.is_prefixed_by(dir))
                .cloned()
                .collect();
            for descendant in descendants {
                watched.remove(&descendant);
                let _ = self
                    .watcher
                    .lock()
                    .expect("watcher poisoned")
                    .unwatch(descendant.path());
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn is_watched(&self, dir: &Uri) -> bool {
        self.watched.lock().expect("watch set poisoned").contains(dir)
    }

    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.watched.lock().expect("watch set poisoned").len()
    }

    /// Takes ownership of the raw event receiver. May only be called once;
    /// panics otherwise, since a second caller would silently starve the
    /// first.
    pub fn take_raw_events(&self) -> mpsc::UnboundedReceiver<Event> {
        self.raw_rx
            .lock()
            .expect("raw_rx poisoned")
            .take()
            .expect("take_raw_events called more than once")
    }
}

/// Translates one raw `notify::Event` into zero or more [`MonitorEvent`]s,
/// applying the locked/temporary-file filter from §4.2 at the point of
/// emission.
#[must_use]
pub fn translate(event: &Event) -> Vec<MonitorEvent> {
    let accepted_paths: Vec<_> = event
        .paths
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |name| !is_locked_name(name))
        })
        .collect();

    if accepted_paths.is_empty() {
        return Vec::new();
    }

    match &event.kind {
        EventKind::Create(CreateKind::Folder) => accepted_paths
            .into_iter()
            .map(|p| MonitorEvent::Created {
                uri: Uri::from_path(p),
                is_dir: true,
            })
            .collect(),
        EventKind::Create(_) => accepted_paths
            .into_iter()
            .map(|p| MonitorEvent::Created {
                uri: Uri::from_path(p),
                is_dir: false,
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if accepted_paths.len() == 2 => {
            vec![MonitorEvent::Moved {
                from: Uri::from_path(accepted_paths[0]),
                to: Uri::from_path(accepted_paths[1]),
                is_dir: accepted_paths[1].is_dir(),
                is_source_monitored: true,
            }]
        }
        // The platform couldn't correlate the two halves of a rename into a
        // single `RenameMode::Both` event. We only ever see one side, so we
        // can't build a real `Moved`: treat the `From` half as a delete of
        // the old path and the `To`/`Any` half as a discovery of the new one
        // (§4.2's "is_source_monitored = false" contract, applied per-path
        // rather than via a synthetic `from`).
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => accepted_paths
            .into_iter()
            .map(|p| MonitorEvent::Deleted {
                uri: Uri::from_path(p),
                is_dir: p.is_dir(),
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) => accepted_paths
            .into_iter()
            .map(|p| MonitorEvent::Created {
                uri: Uri::from_path(p),
                is_dir: p.is_dir(),
            })
            .collect(),
        EventKind::Modify(_) => accepted_paths
            .into_iter()
            .map(|p| MonitorEvent::Updated {
                uri: Uri::from_path(p),
                is_dir: p.is_dir(),
            })
            .collect(),
        EventKind::Remove(kind) => accepted_paths
            .into_iter()
            .map(|p| MonitorEvent::Deleted {
                uri: Uri::from_path(p),
                is_dir: matches!(kind, RemoveKind::Folder),
            })
            .collect(),
        EventKind::Access(_) | EventKind::Other | EventKind::Any => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_names_are_filtered_out_of_translation() {
        let event = Event {
            kind: EventKind::Create(CreateKind::File),
            paths: vec!["/data/download.crdownload".into()],
            attrs: notify::event::EventAttributes::default(),
        };
        assert!(translate(&event).is_empty());
    }

    #[test]
    fn create_translates_to_created() {
        let event = Event {
            kind: EventKind::Create(CreateKind::File),
            paths: vec!["/data/a.txt".into()],
            attrs: notify::event::EventAttributes::default(),
        };
        let events = translate(&event);
        assert_eq!(
            events,
            vec![MonitorEvent::Created {
                uri: Uri::from_path("/data/a.txt"),
                is_dir: false
            }]
        );
    }

    #[test]
    fn atomic_rename_translates_to_moved_with_known_source() {
        let event = Event {
            kind: EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            paths: vec!["/data/old.txt".into(), "/data/new.txt".into()],
            attrs: notify::event::EventAttributes::default(),
        };
        let events = translate(&event);
        assert_eq!(
            events,
            vec![MonitorEvent::Moved {
                from: Uri::from_path("/data/old.txt"),
                to: Uri::from_path("/data/new.txt"),
                is_dir: false,
                is_source_monitored: true,
            }]
        );
    }
}
