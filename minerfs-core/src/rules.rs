//! Glob-based accept/reject rules feeding [`crate::policy::IndexingPolicy::should_check`].
//!
//! Grounded in the teacher's `sd-core-indexer-rules`: an ordered set of
//! [`IndexerRule`]s, each either a glob-based accept/reject for files or
//! directories, or a presence check against a directory's already-listed
//! children (used to e.g. reject a directory that looks like a backup root
//! because it contains a marker file).

use std::collections::HashSet;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid glob pattern {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleTarget {
    Files,
    Directories,
}

enum Matcher {
    Glob { target: RuleTarget, set: GlobSet },
    ChildrenPresent { names: HashSet<String>, accept: bool },
}

/// A single rule. Construct via [`IndexerRule::accept_glob`],
/// [`IndexerRule::reject_glob`] or [`IndexerRule::children_present`].
pub struct IndexerRule {
    matcher: Matcher,
}

impl IndexerRule {
    pub fn accept_glob(target: RuleTarget, patterns: &[&str]) -> Result<Self, Error> {
        Ok(Self {
            matcher: Matcher::Glob {
                target,
                set: build_glob_set(patterns)?,
            },
        })
    }

    pub fn reject_glob(target: RuleTarget, patterns: &[&str]) -> Result<Self, Error> {
        Self::accept_glob(target, patterns)
    }

    /// Rejects (if `accept = false`) or requires (if `accept = true`) that a
    /// directory's already-enumerated children include one of `names`. Used
    /// for `check-directory-contents` (§4.3), so this only ever applies to
    /// directories and only once the full child list is in hand.
    #[must_use]
    pub fn children_present(names: &[&str], accept: bool) -> Self {
        Self {
            matcher: Matcher::ChildrenPresent {
                names: names.iter().map(|s| (*s).to_string()).collect(),
                accept,
            },
        }
    }

    fn is_directory_content_rule(&self) -> bool {
        matches!(self.matcher, Matcher::ChildrenPresent { .. })
    }
}

fn build_glob_set(patterns: &[&str]) -> Result<GlobSet, Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| Error::Glob {
            pattern: (*pattern).to_string(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| Error::Glob {
        pattern: patterns.join(","),
        source,
    })
}

/// An ordered, kind-tagged rule set: each rule is either an accept or a
/// reject, applied in the spirit of the teacher's rule engine — a path is
/// accepted iff no reject rule matches it and, when accept rules of the
/// relevant kind exist, at least one of them matches.
pub struct IndexerRules {
    accept: Vec<IndexerRule>,
    reject: Vec<IndexerRule>,
}

impl Default for IndexerRules {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerRules {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accept: Vec::new(),
            reject: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_accept(mut self, rule: IndexerRule) -> Self {
        self.accept.push(rule);
        self
    }

    #[must_use]
    pub fn with_reject(mut self, rule: IndexerRule) -> Self {
        self.reject.push(rule);
        self
    }

    /// `check-file`/`check-directory` (§4.3): does this path pass the glob
    /// rules for its kind?
    #[must_use]
    pub fn matches(&self, path: &Path, target: RuleTarget) -> bool {
        for rule in &self.reject {
            if let Matcher::Glob { target: t, set } = &rule.matcher {
                if *t == target && set.is_match(path) {
                    return false;
                }
            }
        }

        let relevant_accepts: Vec<_> = self
            .accept
            .iter()
            .filter_map(|rule| match &rule.matcher {
                Matcher::Glob { target: t, set } if *t == target => Some(set),
                _ => None,
            })
            .collect();

        relevant_accepts.is_empty() || relevant_accepts.iter().any(|set| set.is_match(path))
    }

    /// `check-directory-contents` (§4.3): with the full child-name list in
    /// hand, should this directory still be descended into?
    #[must_use]
    pub fn matches_contents(&self, children: &[String]) -> bool {
        let present = |names: &HashSet<String>| children.iter().any(|c| names.contains(c));

        for rule in self.reject.iter().filter(|r| r.is_directory_content_rule()) {
            if let Matcher::ChildrenPresent { names, accept: false } = &rule.matcher {
                if present(names) {
                    return false;
                }
            }
        }

        let content_accepts: Vec<_> = self
            .accept
            .iter()
            .filter_map(|rule| match &rule.matcher {
                Matcher::ChildrenPresent { names, accept: true } => Some(names),
                _ => None,
            })
            .collect();

        content_accepts.is_empty() || content_accepts.iter().any(|names| present(names))
    }
}

/// A sensible starting rule set: hidden entries and common build/VCS
/// directories are rejected by default, matching the teacher's seeded
/// system rules (`.git`, `node_modules`, `target`, ...).
pub fn default_rules() -> IndexerRules {
    IndexerRules::new()
        .with_reject(
            IndexerRule::reject_glob(RuleTarget::Directories, &[".git", "node_modules", "target", ".svn", ".hg"])
                .expect("default patterns are valid globs"),
        )
        .with_reject(
            IndexerRule::reject_glob(RuleTarget::Files, &["*.part", "*.crdownload", ".#*", "*~"])
                .expect("default patterns are valid globs"),
        )
}
