//! Crawl orchestration: install baseline, check every script, install what
//! is missing, re-check, stop.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::decision::{Decision, decide};
use crate::core::run_state::RunState;
use crate::core::types::FileOutcome;
use crate::exit_codes;
use crate::freshness::{FreshnessReport, find_upgrade_candidates};
use crate::io::config::RunConfiguration;
use crate::io::discovery::{DiscoveryRules, discover};
use crate::io::manifest::PackageManifest;
use crate::io::package_manager::PackageManager;
use crate::io::registry::RegistryLookup;
use crate::io::supervisor::{SuperviseRequest, Supervisor};
use crate::pool::for_each_bounded;

/// Reason why [`Orchestrator::run`] stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// Every checked file ran cleanly.
    Clean,
    /// Problems were found and reported without (further) auto-fixing.
    Reported,
    /// Modules were still missing once the retry budget was spent.
    GaveUp { attempts: u32 },
    /// The package manager failed to add the missing modules.
    InstallFailed { modules: Vec<String>, error: String },
    /// The root, or a path under it, could not be inspected.
    PathUnreadable { path: PathBuf, reason: String },
}

impl RunStop {
    /// Stops that end the run before it could converge.
    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            RunStop::GaveUp { .. } | RunStop::InstallFailed { .. } | RunStop::PathUnreadable { .. }
        )
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunStop::Clean | RunStop::Reported | RunStop::GaveUp { .. } => exit_codes::OK,
            RunStop::InstallFailed { .. } => exit_codes::INSTALL_FAILED,
            RunStop::PathUnreadable { .. } => exit_codes::INVALID,
        }
    }
}

/// Package manager operation issued during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageActionKind {
    Install,
    Add(Vec<String>),
    Upgrade,
}

/// A package manager call and how it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageAction {
    pub kind: PackageActionKind,
    /// `None` on success, the failure message otherwise.
    pub error: Option<String>,
}

impl PackageAction {
    fn from_result(kind: PackageActionKind, result: Result<()>) -> Self {
        Self {
            kind,
            error: result.err().map(|err| format!("{err:#}")),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Progress notifications emitted while a run is in flight.
#[derive(Debug)]
pub enum CrawlEvent<'a> {
    Installing,
    PassStarted { pass: u32, files: usize },
    FileChecked(&'a FileOutcome),
    Adding(&'a [String]),
    CheckingFreshness { packages: usize },
    Upgrading(usize),
}

/// Summary of one crawl invocation.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub root: PathBuf,
    pub stop: RunStop,
    /// Outcomes of the final pass plus the attempt counter.
    pub state: RunState,
    pub manifest: Option<PackageManifest>,
    /// Package manager calls in the order they were issued.
    pub actions: Vec<PackageAction>,
    pub freshness: Option<FreshnessReport>,
}

/// Drives one invocation through install → discover → check → decide.
///
/// Owns the [`RunState`]; workers only ever hand outcomes back through the
/// pool's channel.
pub struct Orchestrator<'a, S, P, R> {
    config: &'a RunConfiguration,
    supervisor: &'a S,
    package_manager: &'a P,
    registry: &'a R,
    state: RunState,
    actions: Vec<PackageAction>,
}

impl<'a, S: Supervisor, P: PackageManager, R: RegistryLookup> Orchestrator<'a, S, P, R> {
    pub fn new(
        config: &'a RunConfiguration,
        supervisor: &'a S,
        package_manager: &'a P,
        registry: &'a R,
    ) -> Self {
        Self {
            config,
            supervisor,
            package_manager,
            registry,
            state: RunState::default(),
            actions: Vec::new(),
        }
    }

    /// Run to completion.
    ///
    /// Per-file failures never stop the run; only an unreadable path, an
    /// exhausted retry budget, or a failed `add` do, and each of those is
    /// reported through [`RunStop`] rather than as an error.
    #[instrument(skip_all, fields(root = %self.config.root.display(), force = self.config.force))]
    pub fn run<F>(mut self, mut on_event: F) -> Result<RunReport>
    where
        F: FnMut(CrawlEvent<'_>),
    {
        let root = self.config.root.clone();
        let is_dir = match fs::metadata(&root) {
            Ok(metadata) => metadata.is_dir(),
            Err(err) => {
                warn!(err = %err, "could not inspect root");
                return Ok(self.unreadable(&root, err.to_string(), None));
            }
        };

        let manifest_path = self.config.manifest_path();
        let manifest = load_manifest(&manifest_path);
        if manifest_path.exists() {
            on_event(CrawlEvent::Installing);
            let result = self.package_manager.install();
            if let Err(err) = &result {
                warn!(err = %err, "baseline install failed, checking anyway");
            }
            self.actions
                .push(PackageAction::from_result(PackageActionKind::Install, result));
        }

        let rules = DiscoveryRules {
            script_extensions: self.config.settings.script_extensions.clone(),
            dependency_dir: self.config.settings.dependency_dir.clone(),
        };

        let stop = loop {
            self.state.begin_pass();
            let files = if is_dir {
                match discover(&root, &rules) {
                    Ok(files) => files,
                    Err(err) => {
                        warn!(err = %err, "could not walk root");
                        return Ok(self.unreadable(&root, format!("{err:#}"), manifest));
                    }
                }
            } else {
                vec![root.clone()]
            };
            info!(pass = self.state.passes, files = files.len(), "checking pass");
            on_event(CrawlEvent::PassStarted {
                pass: self.state.passes,
                files: files.len(),
            });
            self.check_all(files, &mut on_event);

            match decide(&self.state, self.config.force, self.config.max_retries()) {
                Decision::Clean => break RunStop::Clean,
                Decision::Report => break RunStop::Reported,
                Decision::GiveUp => {
                    warn!(attempts = self.state.attempt_count, "giving up on missing modules");
                    break RunStop::GaveUp {
                        attempts: self.state.attempt_count,
                    };
                }
                Decision::Install(modules) => {
                    on_event(CrawlEvent::Adding(&modules));
                    let result = self.package_manager.add(&modules);
                    self.state.attempt_count += 1;
                    let action =
                        PackageAction::from_result(PackageActionKind::Add(modules.clone()), result);
                    let error = action.error.clone();
                    self.actions.push(action);
                    if let Some(error) = error {
                        warn!(error = %error, "adding modules failed, not re-checking");
                        break RunStop::InstallFailed { modules, error };
                    }
                    debug!(attempt = self.state.attempt_count, "modules added, re-crawling");
                }
            }
        };

        let freshness = match &manifest {
            Some(manifest) if self.config.verbose => {
                Some(self.freshness_pass(manifest, &mut on_event))
            }
            _ => None,
        };

        info!(
            stop = ?stop,
            good = self.state.good_files.len(),
            erroring = self.state.erroring_files.len(),
            "crawl finished"
        );
        Ok(RunReport {
            root,
            stop,
            state: self.state,
            manifest,
            actions: self.actions,
            freshness,
        })
    }

    fn check_all<F>(&mut self, files: Vec<PathBuf>, on_event: &mut F)
    where
        F: FnMut(CrawlEvent<'_>),
    {
        let requests: Vec<SuperviseRequest> = files
            .into_iter()
            .map(|file| SuperviseRequest {
                file,
                timeout: self.config.child_timeout(),
                capture_stdout: self.config.verbose,
            })
            .collect();
        let supervisor = self.supervisor;
        let state = &mut self.state;
        for_each_bounded(
            &requests,
            self.config.settings.concurrency,
            |request| supervisor.supervise(request),
            |outcome| {
                on_event(CrawlEvent::FileChecked(&outcome));
                state.record(outcome);
            },
        );
    }

    fn freshness_pass<F>(&mut self, manifest: &PackageManifest, on_event: &mut F) -> FreshnessReport
    where
        F: FnMut(CrawlEvent<'_>),
    {
        on_event(CrawlEvent::CheckingFreshness {
            packages: manifest.declared().count(),
        });
        let mut report = find_upgrade_candidates(
            manifest,
            &self.config.dependency_dir(),
            self.registry,
            self.config.settings.concurrency,
        );
        if self.config.force && !report.candidates.is_empty() {
            on_event(CrawlEvent::Upgrading(report.candidates.len()));
            let action = PackageAction::from_result(
                PackageActionKind::Upgrade,
                self.package_manager.upgrade(),
            );
            report.upgraded = Some(action.succeeded());
            self.actions.push(action);
        }
        report
    }

    fn unreadable(
        self,
        path: &Path,
        reason: String,
        manifest: Option<PackageManifest>,
    ) -> RunReport {
        RunReport {
            root: self.config.root.clone(),
            stop: RunStop::PathUnreadable {
                path: path.to_path_buf(),
                reason,
            },
            state: self.state,
            manifest,
            actions: self.actions,
            freshness: None,
        }
    }
}

/// A manifest that exists but does not parse is treated as absent for
/// seeding purposes; the baseline install still runs.
fn load_manifest(path: &Path) -> Option<PackageManifest> {
    match PackageManifest::load_optional(path) {
        Ok(manifest) => manifest,
        Err(err) => {
            warn!(err = %err, "ignoring unreadable manifest");
            None
        }
    }
}
