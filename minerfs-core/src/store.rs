//! The external metadata store sink (§6) and the write-only [`Builder`]
//! scoped to a single extraction (§3).
//!
//! The store's schema and query language are explicitly out of scope (§1) —
//! this module only defines the two operations the core actually drives
//! (`batch_update`, `query`) plus a minimal convention (`last_modified`) the
//! up-to-date check needs, and a trivial in-memory implementation used by
//! tests and the demo binary in place of a real triple store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::uri::Uri;

/// A write-only accumulator of update statements, scoped to one extractor
/// invocation. The extractor writes into it; the pool reclaims it on
/// completion and forwards its contents to the store as a single batch
/// prefixed with `DROP GRAPH <uri>` (§4.6), making the update idempotent
/// per URI.
#[derive(Debug, Default, Clone)]
pub struct Builder {
    statements: Vec<String>,
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    /// Renders the accumulated statements as the body of a batch update for
    /// `uri`, prefixed with `DROP GRAPH <uri>` so re-application is
    /// idempotent (§4.6, §5).
    #[must_use]
    pub fn into_batch(self, uri: &Uri) -> String {
        let mut text = format!("DROP GRAPH <{uri}>;\n");
        for statement in self.statements {
            text.push_str(&statement);
            text.push('\n');
        }
        text
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum StoreError {
    #[error("store rejected update: {0}")]
    Update(String),
    #[error("store rejected query: {0}")]
    Query(String),
    #[error("operation cancelled")]
    Cancelled,
}

/// The external metadata store (§6). Implementations may parallelize
/// `query`/`batch_update` across URIs, but the core never issues more than
/// one in-flight `batch_update` for the same URI at a time.
#[async_trait]
pub trait Store: Send + Sync {
    async fn batch_update(&self, sparql_text: &str, cancel: &CancellationToken) -> Result<(), StoreError>;

    async fn query(&self, sparql_text: &str, cancel: &CancellationToken) -> Result<Vec<String>, StoreError>;

    /// Convenience built on [`Store::query`]: the recorded `nfo:fileLastModified`
    /// for `uri`, or `None` if the store has no record (§4.4, §6).
    async fn last_modified(&self, uri: &Uri) -> Option<SystemTime> {
        let cancel = CancellationToken::new();
        let query = format!("SELECT ?mtime WHERE {{ <{uri}> nfo:fileLastModified ?mtime }}");
        let rows = self.query(&query, &cancel).await.ok()?;
        rows.first().and_then(|row| parse_rfc3339_secs(row))
    }

    /// Convenience built on [`Store::query`]: every URI the store knows
    /// about that sits at or under `root` (§4.7's recursive rewrite needs
    /// the full descendant set before it can build a rename batch).
    async fn list_descendants(&self, root: &Uri, cancel: &CancellationToken) -> Result<Vec<Uri>, StoreError> {
        let query = format!("SELECT ?child WHERE {{ ?child nie:isStoredAs ?p . FILTER(STRSTARTS(?p, \"{root}\")) }}");
        let rows = self.query(&query, cancel).await?;
        Ok(rows.into_iter().map(|row| Uri::from_path(row.trim_start_matches("file://"))).collect())
    }
}

fn parse_rfc3339_secs(s: &str) -> Option<SystemTime> {
    let secs: u64 = s.parse().ok()?;
    Some(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(secs))
}

/// A trivial in-process [`Store`] for tests and the demo binary: rows are
/// `"<secs-since-epoch>"` strings for the one query shape [`Store::last_modified`]
/// issues, and `batch_update` just records the last text it was given per URI.
#[derive(Default)]
pub struct InMemoryStore {
    mtimes: Mutex<HashMap<Uri, SystemTime>>,
    applied: Mutex<Vec<String>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_last_modified(&self, uri: &Uri, mtime: SystemTime) {
        self.mtimes.lock().expect("mtimes poisoned").insert(uri.clone(), mtime);
    }

    #[must_use]
    pub fn applied_batches(&self) -> Vec<String> {
        self.applied.lock().expect("applied poisoned").clone()
    }

    #[must_use]
    pub fn knows(&self, uri: &Uri) -> bool {
        self.mtimes.lock().expect("mtimes poisoned").contains_key(uri)
    }

    pub async fn forget(&self, uri: &Uri) {
        self.mtimes.lock().expect("mtimes poisoned").remove(uri);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn batch_update(&self, sparql_text: &str, cancel: &CancellationToken) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        self.applied.lock().expect("applied poisoned").push(sparql_text.to_string());
        Ok(())
    }

    async fn query(&self, sparql_text: &str, cancel: &CancellationToken) -> Result<Vec<String>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        if let Some(root_str) = sparql_text
            .strip_prefix("SELECT ?child WHERE { ?child nie:isStoredAs ?p . FILTER(STRSTARTS(?p, \"")
            .and_then(|rest| rest.strip_suffix("\")) }"))
        {
            let root = Uri::from_path(root_str.trim_start_matches("file://"));
            let mtimes = self.mtimes.lock().expect("mtimes poisoned");
            return Ok(mtimes
                .keys()
                .filter(|uri| *uri != &root && uri.is_prefixed_by(&root))
                .map(ToString::to_string)
                .collect());
        }

        // Only other shape this toy store understands: the `last_modified` convention query.
        let uri_str = sparql_text
            .split_once('<')
            .and_then(|(_, rest)| rest.split_once('>'))
            .map(|(uri, _)| uri);

        let Some(uri_str) = uri_str else {
            return Ok(Vec::new());
        };

        let uri = Uri::from_path(uri_str.trim_start_matches("file://"));
        let mtimes = self.mtimes.lock().expect("mtimes poisoned");
        Ok(mtimes
            .get(&uri)
            .map(|t| {
                t.duration_since(SystemTime::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs()
                    .to_string()
            })
            .into_iter()
            .collect())
    }
}
