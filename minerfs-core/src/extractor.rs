//! The extractor callback contract (§6): the user-supplied plugin that turns
//! one file into a batch of store updates.
//!
//! The engine never inspects file contents itself — it only drives this
//! trait, the same seam the teacher's `heavy-lifting` job kinds expose to
//! their own task-specific logic.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::store::Builder;
use crate::uri::Uri;

/// Implemented by the host application. `process_file` is invoked from
/// inside the [`crate::pool::ProcessingPool`] with a fresh [`Builder`] and a
/// cancel token scoped to this one extraction.
///
/// Contract (§6): returning `true` obliges the implementation to eventually
/// call back through [`crate::pool::ProcessingPool::notify_file`] exactly
/// once; returning `false` declines the file outright and no further call is
/// expected. Calling `notify_file` after declining is a programming error.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// `true` to accept `uri` for extraction (completion reported later via
    /// `notify_file`), `false` to decline synchronously.
    async fn process_file(&self, uri: &Uri, builder: &mut Builder, cancel: &CancellationToken) -> bool;
}

/// An extractor that declines every file. Used by the demo binary and by
/// tests that only care about crawl/queue/policy behavior, not extraction.
pub struct NoopExtractor;

#[async_trait]
impl Extractor for NoopExtractor {
    async fn process_file(&self, _uri: &Uri, _builder: &mut Builder, _cancel: &CancellationToken) -> bool {
        false
    }
}

/// An extractor that always accepts and writes one placeholder triple,
/// completing synchronously. Useful in tests that need to exercise the
/// `notify_file` path without a real accept/decline decision.
pub struct AcceptAllExtractor;

#[async_trait]
impl Extractor for AcceptAllExtractor {
    async fn process_file(&self, uri: &Uri, builder: &mut Builder, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        builder.push(format!("<{uri}> a nfo:FileDataObject ."));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_extractor_always_declines() {
        let mut builder = Builder::new();
        let cancel = CancellationToken::new();
        let accepted = NoopExtractor
            .process_file(&Uri::from_path("/data/a.txt"), &mut builder, &cancel)
            .await;
        assert!(!accepted);
        assert!(builder.is_empty());
    }

    #[tokio::test]
    async fn accept_all_extractor_writes_a_triple() {
        let mut builder = Builder::new();
        let cancel = CancellationToken::new();
        let accepted = AcceptAllExtractor
            .process_file(&Uri::from_path("/data/a.txt"), &mut builder, &cancel)
            .await;
        assert!(accepted);
        assert!(!builder.is_empty());
    }

    #[tokio::test]
    async fn accept_all_extractor_declines_once_cancelled() {
        let mut builder = Builder::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let accepted = AcceptAllExtractor
            .process_file(&Uri::from_path("/data/a.txt"), &mut builder, &cancel)
            .await;
        assert!(!accepted);
    }
}
