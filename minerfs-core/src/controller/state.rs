//! Controller phase and per-crawl/lifetime statistics (§3, §4.7).

use std::time::Instant;

use crate::crawler::CrawlStats;
use crate::uri::Uri;

/// `NotStarted -> Crawling -> Draining -> Idle <-> Paused`. `Paused` wraps
/// the phase it interrupted so `resume()` can restore it exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Crawling,
    Draining,
    Idle,
    Paused(Box<Phase>),
}

impl Phase {
    #[must_use]
    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused(_))
    }

    /// Wraps the current phase in `Paused`, a no-op if already paused.
    #[must_use]
    pub fn pause(self) -> Self {
        if self.is_paused() {
            self
        } else {
            Self::Paused(Box::new(self))
        }
    }

    /// Unwraps a `Paused` phase back to what it interrupted; a no-op
    /// otherwise.
    #[must_use]
    pub fn resume(self) -> Self {
        match self {
            Self::Paused(inner) => *inner,
            other => other,
        }
    }
}

/// A root the controller is exclusively responsible for (§3).
#[derive(Debug, Clone)]
pub struct RootEntry {
    pub uri: Uri,
    pub recurse: bool,
    pub monitor: bool,
}

/// Monotonic per-crawl and lifetime counters (§3).
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub files_found: usize,
    pub files_ignored: usize,
    pub dirs_found: usize,
    pub dirs_ignored: usize,
    pub lifetime_files_found: usize,
    pub lifetime_dirs_found: usize,
}

impl Stats {
    /// Folds one crawl's terminal stats into the running totals and zeroes
    /// the per-crawl counters, ready for the next root.
    pub fn absorb_crawl(&mut self, crawl: CrawlStats) {
        self.files_found += crawl.files_found;
        self.files_ignored += crawl.files_ignored;
        self.dirs_found += crawl.dirs_found;
        self.dirs_ignored += crawl.dirs_ignored;
        self.lifetime_files_found += crawl.files_found;
        self.lifetime_dirs_found += crawl.dirs_found;
    }

    pub fn reset_per_crawl(&mut self) {
        self.files_found = 0;
        self.files_ignored = 0;
        self.dirs_found = 0;
        self.dirs_ignored = 0;
    }

    /// `items_total` in the progress formula (§4.7).
    #[must_use]
    pub fn items_total(&self) -> usize {
        self.files_found + self.dirs_found
    }
}

/// Tracks when progress was last reported, enforcing the "at most once per
/// wall-second" rule (§4.7, invariant 6).
#[derive(Default)]
pub struct ProgressGate {
    last_reported: Option<Instant>,
}

impl ProgressGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(progress)` if at least one wall-second has passed since
    /// the last report (or none has happened yet), `None` otherwise.
    pub fn try_report(&mut self, now: Instant, progress: f64) -> Option<f64> {
        let ready = match self.last_reported {
            None => true,
            Some(last) => now.duration_since(last).as_secs() >= 1,
        };
        if ready {
            self.last_reported = Some(now);
            Some(progress)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pause_then_resume_restores_prior_phase() {
        let phase = Phase::Crawling.pause();
        assert!(phase.is_paused());
        assert_eq!(phase.resume(), Phase::Crawling);
    }

    #[test]
    fn pausing_twice_does_not_nest() {
        let phase = Phase::Draining.pause().pause();
        assert_eq!(phase, Phase::Paused(Box::new(Phase::Draining)));
    }

    #[test]
    fn progress_gate_rate_limits_to_once_per_second() {
        let mut gate = ProgressGate::new();
        let t0 = Instant::now();
        assert_eq!(gate.try_report(t0, 0.1), Some(0.1));
        assert_eq!(gate.try_report(t0, 0.2), None);
        assert_eq!(gate.try_report(t0 + Duration::from_millis(1001), 0.3), Some(0.3));
    }

    #[test]
    fn stats_absorb_crawl_accumulates_lifetime_totals() {
        let mut stats = Stats::default();
        stats.absorb_crawl(CrawlStats {
            files_found: 2,
            dirs_found: 1,
            ..Default::default()
        });
        stats.reset_per_crawl();
        stats.absorb_crawl(CrawlStats {
            files_found: 3,
            dirs_found: 0,
            ..Default::default()
        });
        assert_eq!(stats.lifetime_files_found, 5);
        assert_eq!(stats.lifetime_dirs_found, 1);
        assert_eq!(stats.files_found, 3);
    }
}
