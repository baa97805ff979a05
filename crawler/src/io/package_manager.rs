//! Package manager adapter (`npm` / `yarn`).
//!
//! The orchestrator only decides when to call [`PackageManager`] and with which
//! names; success or failure is all it looks at.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_command_with_timeout;

/// The three package manager operations the crawler issues.
pub trait PackageManager {
    /// Wipe the dependency cache and reinstall from the manifest.
    fn install(&self) -> Result<()>;
    /// Install `names` and persist them to the manifest.
    fn add(&self, names: &[String]) -> Result<()>;
    /// Bulk-upgrade installed packages.
    fn upgrade(&self) -> Result<()>;
}

/// Which CLI drives installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerKind {
    Npm,
    Yarn,
}

impl ManagerKind {
    /// `yarn` when a `yarn.lock` sits in the project directory, `npm` otherwise.
    pub fn detect(project_dir: &Path) -> Self {
        if project_dir.join("yarn.lock").exists() {
            ManagerKind::Yarn
        } else {
            ManagerKind::Npm
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            ManagerKind::Npm => "npm",
            ManagerKind::Yarn => "yarn",
        }
    }

    pub fn install_args(self) -> Vec<String> {
        vec!["install".to_string()]
    }

    pub fn add_args(self, names: &[String]) -> Vec<String> {
        let mut args = match self {
            ManagerKind::Npm => vec!["install".to_string(), "--save".to_string()],
            ManagerKind::Yarn => vec!["add".to_string()],
        };
        args.extend(names.iter().cloned());
        args
    }

    pub fn upgrade_args(self) -> Vec<String> {
        match self {
            ManagerKind::Npm => vec!["update".to_string()],
            ManagerKind::Yarn => vec!["upgrade".to_string()],
        }
    }
}

/// Package manager that shells out in the project directory.
#[derive(Debug, Clone)]
pub struct CommandPackageManager {
    pub kind: ManagerKind,
    pub project_dir: PathBuf,
    /// Dependency cache wiped before `install`.
    pub dependency_dir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl CommandPackageManager {
    #[instrument(skip_all, fields(program = self.kind.program(), args = ?args))]
    fn run(&self, args: &[String]) -> Result<()> {
        info!("running package manager");
        let mut cmd = Command::new(self.kind.program());
        cmd.args(args).current_dir(&self.project_dir);

        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run {} {}", self.kind.program(), args.join(" ")))?;

        if output.timed_out {
            warn!(
                timeout_secs = self.timeout.as_secs(),
                "package manager timed out"
            );
            return Err(anyhow!(
                "{} {} timed out after {:?}",
                self.kind.program(),
                args.join(" "),
                self.timeout
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "package manager failed");
            return Err(anyhow!(
                "{} {} failed with status {:?}: {}",
                self.kind.program(),
                args.join(" "),
                output.status.code(),
                output.stderr_text().trim()
            ));
        }
        debug!("package manager completed successfully");
        Ok(())
    }
}

impl PackageManager for CommandPackageManager {
    fn install(&self) -> Result<()> {
        wipe_dependency_dir(&self.dependency_dir)?;
        self.run(&self.kind.install_args())
    }

    fn add(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        self.run(&self.kind.add_args(names))
    }

    fn upgrade(&self) -> Result<()> {
        self.run(&self.kind.upgrade_args())
    }
}

fn wipe_dependency_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    debug!(path = %path.display(), "removing dependency cache");
    fs::remove_dir_all(path).with_context(|| format!("remove {}", path.display()))
}
