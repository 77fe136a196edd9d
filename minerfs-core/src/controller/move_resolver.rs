//! The move-handling algorithm (§4.7) — the genuinely subtle piece.
//!
//! A `Moved{from, to}` item falls back to plain create/delete semantics when
//! the store can't corroborate one side of the rename; otherwise it produces
//! a single batch that rewrites `from`'s identity and every already-indexed
//! descendant's URI in one shot, so no descendant needs re-extraction.

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::store::Store;
use crate::uri::Uri;

/// What the controller should do with a `Moved{from, to}` item, once the
/// store has been consulted.
#[derive(Debug)]
pub enum MoveResolution {
    /// The store never knew `from`; treat `to` as a fresh discovery.
    FallBackToCreate,
    /// `to` no longer exists on disk; treat `from` as removed.
    FallBackToDelete,
    /// The rename is real and corroborated: apply this batch, which rewrites
    /// `from` and every descendant URI under it.
    Rewrite(String),
}

/// Resolves one `Moved{from, to}` item per the three-step algorithm in
/// §4.7. `to_exists` is the crawler/monitor's filesystem stat of `to` at
/// dispatch time — resolution itself never touches the filesystem, only the
/// store.
#[instrument(skip(store, cancel), fields(from = %from, to = %to))]
pub async fn resolve(store: &dyn Store, from: &Uri, to: &Uri, to_exists: bool, cancel: &CancellationToken) -> MoveResolution {
    if store.last_modified(from).await.is_none() {
        return MoveResolution::FallBackToCreate;
    }

    if !to_exists {
        return MoveResolution::FallBackToDelete;
    }

    let descendants = store.list_descendants(from, cancel).await.unwrap_or_default();

    let mut batch = format!(
        "DELETE {{ <{from}> nfo:fileName ?old }} INSERT {{ <{from}> tracker:uri <{to}> ; nfo:fileName \"{name}\" }} WHERE {{ <{from}> nfo:fileName ?old }};\n",
        name = to.display_name(),
    );

    for descendant in descendants {
        if cancel.is_cancelled() {
            break;
        }
        if let Some(rebased) = descendant.rebase(from, to) {
            batch.push_str(&format!("<{descendant}> tracker:uri <{rebased}> .\n"));
        }
    }

    MoveResolution::Rewrite(batch)
}
