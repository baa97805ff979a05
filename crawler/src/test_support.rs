//! Test-only fakes for the crawler's process, package manager and registry
//! seams, plus fixture helpers.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use crate::core::types::{FileOutcome, FileStatus};
use crate::io::config::{CrawlerConfig, RunConfiguration};
use crate::io::package_manager::PackageManager;
use crate::io::registry::RegistryLookup;
use crate::io::supervisor::{SuperviseRequest, Supervisor};

/// Supervisor that replays scripted statuses per file.
///
/// Each call for a file pops the next scripted status; the last one repeats
/// forever. Files without a script are clean.
#[derive(Debug, Default)]
pub struct ScriptedSupervisor {
    scripts: Mutex<HashMap<PathBuf, VecDeque<FileStatus>>>,
    supervised: Mutex<Vec<PathBuf>>,
}

impl ScriptedSupervisor {
    pub fn with(self, file: impl Into<PathBuf>, statuses: Vec<FileStatus>) -> Self {
        self.scripts
            .lock()
            .expect("scripts lock")
            .insert(file.into(), statuses.into());
        self
    }

    /// Every file supervised so far, in call order.
    pub fn supervised(&self) -> Vec<PathBuf> {
        self.supervised.lock().expect("supervised lock").clone()
    }
}

impl Supervisor for ScriptedSupervisor {
    fn supervise(&self, request: &SuperviseRequest) -> FileOutcome {
        self.supervised
            .lock()
            .expect("supervised lock")
            .push(request.file.clone());
        let status = {
            let mut scripts = self.scripts.lock().expect("scripts lock");
            match scripts.get_mut(&request.file) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match status.unwrap_or(FileStatus::Clean) {
            FileStatus::Clean => FileOutcome::clean(&request.file),
            FileStatus::MissingDependency(name) => FileOutcome::missing(&request.file, &name),
            FileStatus::FatalError(detail) => FileOutcome::fatal(&request.file, &detail),
            FileStatus::Timeout => FileOutcome::timeout(&request.file),
        }
    }
}

/// Package manager call recorded by [`RecordingPackageManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageCall {
    Install,
    Add(Vec<String>),
    Upgrade,
}

/// Package manager that records calls and fails on request.
#[derive(Debug, Default)]
pub struct RecordingPackageManager {
    fail_install: bool,
    fail_add: bool,
    fail_upgrade: bool,
    calls: Mutex<Vec<PackageCall>>,
}

impl RecordingPackageManager {
    pub fn failing_install(mut self) -> Self {
        self.fail_install = true;
        self
    }

    pub fn failing_add(mut self) -> Self {
        self.fail_add = true;
        self
    }

    pub fn failing_upgrade(mut self) -> Self {
        self.fail_upgrade = true;
        self
    }

    pub fn calls(&self) -> Vec<PackageCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: PackageCall, fail: bool) -> Result<()> {
        let label = format!("{call:?}");
        self.calls.lock().expect("calls lock").push(call);
        if fail {
            return Err(anyhow!("scripted failure: {label}"));
        }
        Ok(())
    }
}

impl PackageManager for RecordingPackageManager {
    fn install(&self) -> Result<()> {
        self.record(PackageCall::Install, self.fail_install)
    }

    fn add(&self, names: &[String]) -> Result<()> {
        self.record(PackageCall::Add(names.to_vec()), self.fail_add)
    }

    fn upgrade(&self) -> Result<()> {
        self.record(PackageCall::Upgrade, self.fail_upgrade)
    }
}

/// Registry answering from a fixed table; unknown packages are errors.
#[derive(Debug, Default, Clone)]
pub struct StaticRegistry {
    versions: BTreeMap<String, String>,
}

impl StaticRegistry {
    pub fn with(mut self, package: &str, latest: &str) -> Self {
        self.versions.insert(package.to_string(), latest.to_string());
        self
    }
}

impl RegistryLookup for StaticRegistry {
    fn latest_version(&self, package: &str) -> Result<String> {
        self.versions
            .get(package)
            .cloned()
            .ok_or_else(|| anyhow!("{package} not in registry"))
    }
}

/// Non-verbose configuration with default settings.
pub fn run_config(root: &Path, force: bool, max_retries: u32) -> RunConfiguration {
    let settings = CrawlerConfig {
        max_retries,
        ..CrawlerConfig::default()
    };
    RunConfiguration::new(root, false, force, settings).expect("run configuration")
}

/// Write `(relative path, contents)` pairs under `root`, creating parents.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(&path, contents).expect("write fixture file");
    }
}

/// Fresh temporary project containing `files`.
pub fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    write_files(temp.path(), files);
    temp
}

/// Simulate an installed package at `<dependency_dir>/<name>/package.json`.
pub fn install_package(dependency_dir: &Path, name: &str, version: &str) {
    let relative = format!("{name}/package.json");
    let contents = format!(r#"{{"name": "{name}", "version": "{version}"}}"#);
    write_files(dependency_dir, &[(relative.as_str(), contents.as_str())]);
}
