//! Recursive discovery of runnable script files.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

/// What the walker keeps and what it prunes.
#[derive(Debug, Clone)]
pub struct DiscoveryRules {
    /// Extensions (without the dot) of runnable scripts.
    pub script_extensions: Vec<String>,
    /// Dependency-cache directory name, pruned wherever it appears.
    pub dependency_dir: String,
}

impl DiscoveryRules {
    fn is_excluded(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name();
        name.to_string_lossy().starts_with('.') || name == OsStr::new(&self.dependency_dir)
    }

    fn is_script(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                self.script_extensions
                    .iter()
                    .any(|allowed| allowed.as_str() == ext.as_ref())
            })
            .unwrap_or(false)
    }
}

/// List every script file under `root`, depth first.
///
/// Hidden entries and the dependency cache are pruned along with everything
/// below them. Directory symlinks are not followed; a symlink to a regular
/// file is kept. Order follows filesystem enumeration. Any read error is
/// returned, since a partially walked tree would give a misleading report.
#[instrument(skip(rules), fields(root = %root.display()))]
pub fn discover(root: &Path, rules: &DiscoveryRules) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !rules.is_excluded(entry));
    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file || !rules.is_script(entry.path()) {
            continue;
        }
        let path = entry.into_path();
        if seen.insert(path.clone()) {
            files.push(path);
        }
    }

    debug!(count = files.len(), "discovered scripts");
    Ok(files)
}
