//! Dependency manifest (`package.json`) parsing.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::core::types::MissingKind;

/// Declared dependencies of the crawled project. Read-only once parsed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PackageManifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    pub fn parse(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("parse manifest json")
    }

    /// Load the manifest at `path`, or `None` when the file is absent.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!(path = %path.display(), "no manifest");
            return Ok(None);
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let manifest =
            Self::parse(&contents).with_context(|| format!("parse {}", path.display()))?;
        debug!(
            path = %path.display(),
            dependencies = manifest.dependencies.len(),
            dev_dependencies = manifest.dev_dependencies.len(),
            "manifest loaded"
        );
        Ok(Some(manifest))
    }

    /// All declared packages with their constraints, runtime first.
    pub fn declared(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dependencies
            .iter()
            .chain(
                self.dev_dependencies
                    .iter()
                    .filter(|(name, _)| !self.dependencies.contains_key(*name)),
            )
            .map(|(name, constraint)| (name.as_str(), constraint.as_str()))
    }

    pub fn declares(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }

    /// Tag a missing module as a true gap or as an install that did not deliver.
    pub fn missing_kind(&self, name: &str) -> MissingKind {
        if self.declares(name) {
            MissingKind::DeclaredUnresolved
        } else {
            MissingKind::Undeclared
        }
    }
}

/// Version field of an installed package's own manifest.
#[derive(Debug, Deserialize)]
struct InstalledPackage {
    version: Option<String>,
}

/// Read the installed version of `name` from `<dependency_dir>/<name>/package.json`.
///
/// Returns `None` when the package is not installed or its manifest is unreadable.
pub fn installed_version(dependency_dir: &Path, name: &str) -> Option<String> {
    let path = dependency_dir.join(name).join("package.json");
    let contents = fs::read_to_string(&path).ok()?;
    let package: InstalledPackage = serde_json::from_str(&contents).ok()?;
    package.version
}
