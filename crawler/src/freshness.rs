//! Freshness pass: compare installed versions of declared packages with the
//! registry's latest.

use std::path::Path;

use tracing::{debug, instrument};

use crate::core::types::UpgradeCandidate;
use crate::core::version::is_outdated;
use crate::io::manifest::{PackageManifest, installed_version};
use crate::io::registry::RegistryLookup;
use crate::pool::for_each_bounded;

/// Result of one freshness pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreshnessReport {
    /// Outdated packages, sorted by name.
    pub candidates: Vec<UpgradeCandidate>,
    /// Declared packages that had both an installed copy and a registry answer.
    pub checked: usize,
    /// Declared packages skipped (not installed, or lookup failed).
    pub skipped: usize,
    /// `Some(true)` when a bulk upgrade ran and succeeded.
    pub upgraded: Option<bool>,
}

enum Lookup {
    Compared(Option<UpgradeCandidate>),
    Skipped,
}

/// Look up every declared package and collect those whose installed major
/// version trails the latest published one.
///
/// Lookup failures are skipped silently; the pass never fails the run.
#[instrument(skip_all, fields(dependency_dir = %dependency_dir.display()))]
pub fn find_upgrade_candidates<R: RegistryLookup>(
    manifest: &PackageManifest,
    dependency_dir: &Path,
    registry: &R,
    concurrency: usize,
) -> FreshnessReport {
    let names: Vec<&str> = manifest.declared().map(|(name, _)| name).collect();
    let mut report = FreshnessReport::default();

    for_each_bounded(
        &names,
        concurrency,
        |name| {
            let Some(installed) = installed_version(dependency_dir, name) else {
                debug!(package = name, "not installed, skipping");
                return Lookup::Skipped;
            };
            match registry.latest_version(name) {
                Ok(latest) => Lookup::Compared(is_outdated(&installed, &latest).then(|| {
                    UpgradeCandidate {
                        name: (*name).to_string(),
                        installed,
                        latest,
                    }
                })),
                Err(err) => {
                    debug!(package = name, err = %err, "registry lookup failed, skipping");
                    Lookup::Skipped
                }
            }
        },
        |lookup| match lookup {
            Lookup::Compared(candidate) => {
                report.checked += 1;
                report.candidates.extend(candidate);
            }
            Lookup::Skipped => report.skipped += 1,
        },
    );

    report.candidates.sort();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StaticRegistry, install_package};

    fn manifest() -> PackageManifest {
        PackageManifest::parse(
            r#"{"dependencies": {"left-pad": "^1.0.0", "chalk": "^2.0.0", "ghost": "1.0.0"},
                "devDependencies": {"mocha": "^9.0.0"}}"#,
        )
        .expect("manifest")
    }

    #[test]
    fn collects_only_major_version_lag() {
        let temp = tempfile::tempdir().expect("tempdir");
        let deps = temp.path().join("node_modules");
        install_package(&deps, "left-pad", "1.1.0");
        install_package(&deps, "chalk", "2.4.2");
        install_package(&deps, "mocha", "9.2.0");
        let registry = StaticRegistry::default()
            .with("left-pad", "1.3.0")
            .with("chalk", "5.3.0")
            .with("mocha", "10.2.0")
            .with("ghost", "2.0.0");

        let report = find_upgrade_candidates(&manifest(), &deps, &registry, 2);

        let names: Vec<&str> = report.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["chalk", "mocha"]);
        assert_eq!(report.candidates[0].installed, "2.4.2");
        assert_eq!(report.candidates[0].latest, "5.3.0");
        assert_eq!(report.checked, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.upgraded, None);
    }

    #[test]
    fn failed_lookups_are_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let deps = temp.path().join("node_modules");
        install_package(&deps, "left-pad", "0.0.1");

        let report = find_upgrade_candidates(&manifest(), &deps, &StaticRegistry::default(), 4);

        assert!(report.candidates.is_empty());
        assert_eq!(report.checked, 0);
        assert_eq!(report.skipped, 4);
    }
}
