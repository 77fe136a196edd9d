//! Stateless predicates consulted by the controller (§4.4).

use std::time::SystemTime;

use crate::rules::{IndexerRules, RuleTarget};
use crate::store::Store;
use crate::uri::Uri;

/// `should_check ∧ should_monitor ∧ should_change_index`, wired against a
/// concrete [`IndexerRules`] set and a [`Store`] handle.
pub struct IndexingPolicy<'a> {
    rules: &'a IndexerRules,
    monitor_rules: &'a IndexerRules,
}

impl<'a> IndexingPolicy<'a> {
    #[must_use]
    pub fn new(rules: &'a IndexerRules, monitor_rules: &'a IndexerRules) -> Self {
        Self {
            rules,
            monitor_rules,
        }
    }

    /// OR of the user's per-file/per-directory predicates (§4.4): is this
    /// entry even a candidate for indexing?
    #[must_use]
    pub fn should_check(&self, uri: &Uri, is_dir: bool) -> bool {
        let target = if is_dir {
            RuleTarget::Directories
        } else {
            RuleTarget::Files
        };
        self.rules.matches(uri.path(), target)
    }

    /// Whether a watch should be installed on this directory once crawled.
    #[must_use]
    pub fn should_monitor(&self, uri: &Uri) -> bool {
        self.monitor_rules.matches(uri.path(), RuleTarget::Directories)
    }

    /// `check-directory-contents` (§4.3): consulted for descendant
    /// directories only, once their full child-name list is known.
    #[must_use]
    pub fn check_directory_contents(&self, children: &[String]) -> bool {
        self.rules.matches_contents(children)
    }

    /// Queries the store for this URI's recorded mtime and compares it
    /// (rounded to whole seconds, UTC) against the filesystem's current
    /// mtime. A missing store record means "index it" (`true`); an exact
    /// match means "already up to date" (`false`).
    pub async fn should_change_index(
        &self,
        store: &dyn Store,
        uri: &Uri,
        current_mtime: Option<SystemTime>,
    ) -> bool {
        let Some(current_mtime) = current_mtime else {
            return true;
        };

        match store.last_modified(uri).await {
            Some(stored) => !same_second(stored, current_mtime),
            None => true,
        }
    }

    /// `should_check ∧ should_change_index` (§4.4).
    pub async fn should_process(
        &self,
        store: &dyn Store,
        uri: &Uri,
        is_dir: bool,
        current_mtime: Option<SystemTime>,
    ) -> bool {
        self.should_check(uri, is_dir)
            && self.should_change_index(store, uri, current_mtime).await
    }
}

fn same_second(a: SystemTime, b: SystemTime) -> bool {
    let round = |t: SystemTime| {
        t.duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    };
    round(a) == round(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{default_rules, IndexerRule};
    use crate::store::InMemoryStore;
    use std::time::Duration;

    #[test]
    fn should_check_rejects_vcs_directories() {
        let rules = default_rules();
        let monitor_rules = default_rules();
        let policy = IndexingPolicy::new(&rules, &monitor_rules);
        assert!(!policy.should_check(&Uri::from_path("/data/.git"), true));
        assert!(policy.should_check(&Uri::from_path("/data/a.txt"), false));
    }

    #[tokio::test]
    async fn should_change_index_true_when_store_empty() {
        let rules = default_rules();
        let monitor_rules = default_rules();
        let policy = IndexingPolicy::new(&rules, &monitor_rules);
        let store = InMemoryStore::new();
        let uri = Uri::from_path("/data/a.txt");
        assert!(
            policy
                .should_change_index(&store, &uri, Some(SystemTime::now()))
                .await
        );
    }

    #[tokio::test]
    async fn should_change_index_false_on_matching_mtime() {
        let rules = default_rules();
        let monitor_rules = default_rules();
        let policy = IndexingPolicy::new(&rules, &monitor_rules);
        let store = InMemoryStore::new();
        let uri = Uri::from_path("/data/a.txt");
        let mtime = SystemTime::now();

        store.set_last_modified(&uri, mtime).await;

        assert!(
            !policy
                .should_change_index(&store, &uri, Some(mtime + Duration::from_millis(10)))
                .await
        );
    }

    #[test]
    fn check_directory_contents_only_applies_full_listing() {
        let rules = IndexerRules::new()
            .with_reject(IndexerRule::children_present(&[".nomedia"], false));
        let monitor_rules = default_rules();
        let policy = IndexingPolicy::new(&rules, &monitor_rules);
        assert!(!policy.check_directory_contents(&[".nomedia".to_string()]));
        assert!(policy.check_directory_contents(&["a.txt".to_string()]));
    }
}
