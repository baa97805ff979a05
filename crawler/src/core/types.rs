//! Shared deterministic types for crawler core logic.
//!
//! These types define stable contracts between the supervisor, the
//! orchestrator and the report. They carry no I/O handles.

use std::path::PathBuf;

/// Classified result of running one script file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// Process exited successfully within its time budget.
    Clean,
    /// Process could not resolve an external package (auto-fixable).
    MissingDependency(String),
    /// Process failed for any other reason; carries the captured stderr.
    FatalError(String),
    /// Process exceeded its wall-clock budget and was killed.
    Timeout,
}

impl FileStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::Clean => "clean",
            FileStatus::MissingDependency(_) => "missing-dependency",
            FileStatus::FatalError(_) => "fatal",
            FileStatus::Timeout => "timeout",
        }
    }
}

/// Outcome of supervising a single file. Exactly one per checked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Raw diagnostic text (captured stderr). Empty for clean runs.
    pub diagnostic: String,
}

impl FileOutcome {
    pub fn clean(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Clean,
            diagnostic: String::new(),
        }
    }

    pub fn missing(path: impl Into<PathBuf>, module: &str) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::MissingDependency(module.to_string()),
            diagnostic: format!("Error: Cannot find module '{module}'"),
        }
    }

    pub fn fatal(path: impl Into<PathBuf>, detail: &str) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::FatalError(detail.to_string()),
            diagnostic: detail.to_string(),
        }
    }

    pub fn timeout(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Timeout,
            diagnostic: String::new(),
        }
    }
}

/// Declared package whose installed copy lags behind the registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UpgradeCandidate {
    pub name: String,
    pub installed: String,
    pub latest: String,
}

/// Why a missing module could not be resolved, relative to the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingKind {
    /// Not declared in the manifest: a true gap.
    Undeclared,
    /// Declared, yet still unresolved: the install did not provide it.
    DeclaredUnresolved,
}
