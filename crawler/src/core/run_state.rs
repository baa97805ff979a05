//! Aggregated results of one crawl invocation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::core::types::{FileOutcome, FileStatus};

/// Mutable bookkeeping owned by the orchestrator.
///
/// Pass-scoped collections are cleared by [`RunState::begin_pass`];
/// `attempt_count` survives across passes and only grows. Recording is a
/// commutative union, so outcomes may arrive in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    /// Files that ran cleanly in the current pass.
    pub good_files: BTreeSet<PathBuf>,
    /// Fatal or timed-out files with their diagnostic text.
    pub erroring_files: BTreeMap<PathBuf, ErroringFile>,
    /// Files that stopped on a missing package, keyed to that package.
    pub blocked_files: BTreeMap<PathBuf, String>,
    /// Deduplicated missing package names across the pass.
    pub missing_module_names: BTreeSet<String>,
    /// Number of dependency installs already attempted (retries).
    pub attempt_count: u32,
    /// Number of passes started so far.
    pub passes: u32,
}

/// Reason a file landed in `erroring_files`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErroringFile {
    pub timed_out: bool,
    pub diagnostic: String,
}

impl RunState {
    /// Start a new pass: drop previous outcomes, keep the attempt counter.
    pub fn begin_pass(&mut self) {
        self.good_files.clear();
        self.erroring_files.clear();
        self.blocked_files.clear();
        self.missing_module_names.clear();
        self.passes += 1;
    }

    /// Fold one file outcome into the pass.
    ///
    /// A path recorded twice keeps only its latest outcome so it never sits
    /// in two collections at once.
    pub fn record(&mut self, outcome: FileOutcome) {
        self.forget(&outcome.path);
        match outcome.status {
            FileStatus::Clean => {
                self.good_files.insert(outcome.path);
            }
            FileStatus::MissingDependency(name) => {
                self.missing_module_names.insert(name.clone());
                self.blocked_files.insert(outcome.path, name);
            }
            FileStatus::FatalError(_) => {
                self.erroring_files.insert(
                    outcome.path,
                    ErroringFile {
                        timed_out: false,
                        diagnostic: outcome.diagnostic,
                    },
                );
            }
            FileStatus::Timeout => {
                self.erroring_files.insert(
                    outcome.path,
                    ErroringFile {
                        timed_out: true,
                        diagnostic: outcome.diagnostic,
                    },
                );
            }
        }
    }

    fn forget(&mut self, path: &Path) {
        self.good_files.remove(path);
        self.erroring_files.remove(path);
        if let Some(name) = self.blocked_files.remove(path)
            && !self.blocked_files.values().any(|other| *other == name)
        {
            self.missing_module_names.remove(&name);
        }
    }

    /// No fatal files and nothing missing.
    pub fn is_clean(&self) -> bool {
        self.erroring_files.is_empty() && self.missing_module_names.is_empty()
    }

    /// Total files recorded in the current pass.
    pub fn checked(&self) -> usize {
        self.good_files.len() + self.erroring_files.len() + self.blocked_files.len()
    }

    pub fn missing_modules(&self) -> Vec<String> {
        self.missing_module_names.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FileOutcome;

    fn sample() -> Vec<FileOutcome> {
        vec![
            FileOutcome::clean("/p/a.js"),
            FileOutcome::missing("/p/b.js", "left-pad"),
            FileOutcome::missing("/p/c.js", "left-pad"),
            FileOutcome::missing("/p/d.js", "chalk"),
            FileOutcome::fatal("/p/e.js", "SyntaxError"),
            FileOutcome::timeout("/p/f.js"),
        ]
    }

    #[test]
    fn record_partitions_outcomes() {
        let mut state = RunState::default();
        state.begin_pass();
        for outcome in sample() {
            state.record(outcome);
        }

        assert_eq!(state.good_files.len(), 1);
        assert_eq!(state.erroring_files.len(), 2);
        assert!(state.erroring_files[Path::new("/p/f.js")].timed_out);
        assert_eq!(state.missing_modules(), vec!["chalk", "left-pad"]);
        assert_eq!(state.checked(), 6);
        assert!(!state.is_clean());
    }

    #[test]
    fn recording_order_does_not_matter() {
        let forward = {
            let mut state = RunState::default();
            for outcome in sample() {
                state.record(outcome);
            }
            state
        };
        let reversed = {
            let mut state = RunState::default();
            for outcome in sample().into_iter().rev() {
                state.record(outcome);
            }
            state
        };
        assert_eq!(forward, reversed);
    }

    #[test]
    fn begin_pass_keeps_attempt_count() {
        let mut state = RunState::default();
        state.begin_pass();
        state.record(FileOutcome::missing("/p/a.js", "x"));
        state.attempt_count = 1;

        state.begin_pass();
        assert!(state.missing_module_names.is_empty());
        assert!(state.blocked_files.is_empty());
        assert_eq!(state.attempt_count, 1);
        assert_eq!(state.passes, 2);
    }

    #[test]
    fn rerecorded_path_lives_in_one_collection() {
        let mut state = RunState::default();
        state.record(FileOutcome::missing("/p/a.js", "left-pad"));
        state.record(FileOutcome::clean("/p/a.js"));

        assert!(state.good_files.contains(Path::new("/p/a.js")));
        assert!(state.blocked_files.is_empty());
        assert!(state.missing_module_names.is_empty());
        assert!(state.is_clean());
    }
}
