//! Per-worker tallies and the run report
//!
//! Each worker counts its own outcomes and hands the tally over with its
//! completion signal, so the pools never share a counter.

use std::ops::AddAssign;
use std::time::Duration;

/// Outcomes counted by one pull worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullTally {
    pub pulled: usize,
    pub renamed: usize,
    pub pull_failures: usize,
    pub rename_failures: usize,
    /// Tags of repositories with no target mapping
    pub skipped: usize,
}

impl AddAssign for PullTally {
    fn add_assign(&mut self, other: Self) {
        self.pulled += other.pulled;
        self.renamed += other.renamed;
        self.pull_failures += other.pull_failures;
        self.rename_failures += other.rename_failures;
        self.skipped += other.skipped;
    }
}

/// Outcomes counted by one push worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushTally {
    pub pushed: usize,
    pub push_failures: usize,
}

impl AddAssign for PushTally {
    fn add_assign(&mut self, other: Self) {
        self.pushed += other.pushed;
        self.push_failures += other.push_failures;
    }
}

/// Totals for one migration run. Failures here never turn the run into an
/// error; they are for the summary only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub repositories: usize,
    pub images: usize,
    pub pull: PullTally,
    pub push: PushTally,
    pub elapsed: Duration,
}

impl MigrationReport {
    pub fn failures(&self) -> usize {
        self.pull.pull_failures + self.pull.rename_failures + self.push.push_failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures() == 0 && self.pull.skipped == 0
    }

    pub fn summary_items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Repositories", self.repositories.to_string()),
            ("Images", self.images.to_string()),
            ("Pulled", self.pull.pulled.to_string()),
            ("Renamed", self.pull.renamed.to_string()),
            ("Pushed", self.push.pushed.to_string()),
            ("Skipped (unmapped)", self.pull.skipped.to_string()),
            ("Pull failures", self.pull.pull_failures.to_string()),
            ("Rename failures", self.pull.rename_failures.to_string()),
            ("Push failures", self.push.push_failures.to_string()),
        ]
    }
}
