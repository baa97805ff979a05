//! Human-readable summary of a finished run.

use std::fmt::Write as _;

use crate::core::types::MissingKind;
use crate::orchestrator::{PackageActionKind, RunReport, RunStop};

/// Render `report` as plain text. The last line is always the verdict.
pub fn render(report: &RunReport) -> String {
    let mut out = String::new();
    let state = &report.state;
    let _ = writeln!(out, "crawled: {}", report.root.display());

    if let RunStop::PathUnreadable { path, reason } = &report.stop {
        let _ = writeln!(out, "could not inspect path {}: {reason}", path.display());
        return out;
    }

    match &report.manifest {
        Some(manifest) => {
            let declared: Vec<&str> = manifest.declared().map(|(name, _)| name).collect();
            if declared.is_empty() {
                out.push_str("declared packages: none\n");
            } else {
                let _ = writeln!(out, "declared packages: {}", declared.join(", "));
            }
        }
        None => out.push_str("declared packages: no manifest\n"),
    }

    for action in &report.actions {
        let label = match &action.kind {
            PackageActionKind::Install => "install".to_string(),
            PackageActionKind::Add(names) => format!("add {}", names.join(" ")),
            PackageActionKind::Upgrade => "upgrade".to_string(),
        };
        match &action.error {
            None => {
                let _ = writeln!(out, "{label}: ok");
            }
            Some(error) => {
                let _ = writeln!(out, "{label}: failed ({})", first_line(error));
            }
        }
    }

    let _ = writeln!(
        out,
        "checked {} file(s) over {} pass(es): {} good",
        state.checked(),
        state.passes,
        state.good_files.len()
    );

    if !state.good_files.is_empty() {
        out.push_str("good files:\n");
        for path in &state.good_files {
            let _ = writeln!(out, "  {}", path.display());
        }
    }

    if !state.erroring_files.is_empty() {
        out.push_str("fatal crashes from:\n");
        for (path, erroring) in &state.erroring_files {
            let detail = if erroring.timed_out {
                "timed out".to_string()
            } else {
                first_line(&erroring.diagnostic).to_string()
            };
            let _ = writeln!(out, "  {}: {detail}", path.display());
        }
    }

    if !state.missing_module_names.is_empty() {
        out.push_str("modules to add:\n");
        for name in &state.missing_module_names {
            let users = state
                .blocked_files
                .values()
                .filter(|blocked| *blocked == name)
                .count();
            let kind = match report.manifest.as_ref().map(|m| m.missing_kind(name)) {
                Some(MissingKind::DeclaredUnresolved) => " (declared but not resolved)",
                Some(MissingKind::Undeclared) | None => "",
            };
            let _ = writeln!(out, "  {name}{kind}, needed by {users} file(s)");
        }
    }

    if let Some(freshness) = &report.freshness {
        let _ = writeln!(
            out,
            "freshness: {} package(s) compared, {} skipped",
            freshness.checked, freshness.skipped
        );
        if freshness.candidates.is_empty() {
            out.push_str("all installed packages are current\n");
        } else {
            out.push_str("upgrade candidates:\n");
            for candidate in &freshness.candidates {
                let _ = writeln!(
                    out,
                    "  {}: {} -> {}",
                    candidate.name, candidate.installed, candidate.latest
                );
            }
            if freshness.upgraded.is_none() {
                out.push_str("re-run with --force to upgrade\n");
            }
        }
    }

    out.push_str(&verdict(report));
    out.push('\n');
    out
}

fn verdict(report: &RunReport) -> String {
    match &report.stop {
        RunStop::Clean => "no problems.".to_string(),
        RunStop::Reported if !report.state.missing_module_names.is_empty() => {
            "re-run with --force to install missing modules".to_string()
        }
        RunStop::Reported => "fix the files above and re-run".to_string(),
        RunStop::GaveUp { attempts } => format!("gave up after {attempts} tries"),
        RunStop::InstallFailed { modules, error } => format!(
            "could not add {}: {}",
            modules.join(", "),
            first_line(error)
        ),
        RunStop::PathUnreadable { path, reason } => {
            format!("could not inspect path {}: {reason}", path.display())
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::run_state::RunState;
    use crate::core::types::{FileOutcome, UpgradeCandidate};
    use crate::freshness::FreshnessReport;
    use crate::io::manifest::PackageManifest;
    use crate::orchestrator::PackageAction;
    use std::path::PathBuf;

    fn report(stop: RunStop, outcomes: Vec<FileOutcome>) -> RunReport {
        let mut state = RunState::default();
        state.begin_pass();
        for outcome in outcomes {
            state.record(outcome);
        }
        RunReport {
            root: PathBuf::from("/p"),
            stop,
            state,
            manifest: None,
            actions: Vec::new(),
            freshness: None,
        }
    }

    #[test]
    fn clean_run_ends_with_no_problems() {
        let rendered = render(&report(RunStop::Clean, vec![FileOutcome::clean("/p/a.js")]));
        assert_eq!(rendered.lines().last(), Some("no problems."));
        assert!(rendered.contains("declared packages: no manifest"));
        assert!(rendered.contains("checked 1 file(s) over 1 pass(es): 1 good"));
        assert!(rendered.contains("good files:\n  /p/a.js\n"));
    }

    #[test]
    fn missing_modules_without_force_suggest_rerun() {
        let mut report = report(
            RunStop::Reported,
            vec![
                FileOutcome::missing("/p/a.js", "left-pad"),
                FileOutcome::missing("/p/b.js", "left-pad"),
                FileOutcome::missing("/p/c.js", "chalk"),
            ],
        );
        report.manifest = Some(
            PackageManifest::parse(r#"{"dependencies": {"chalk": "^5.0.0"}}"#).expect("manifest"),
        );
        let rendered = render(&report);
        assert!(rendered.contains("  chalk (declared but not resolved), needed by 1 file(s)"));
        assert!(rendered.contains("  left-pad, needed by 2 file(s)"));
        assert_eq!(
            rendered.lines().last(),
            Some("re-run with --force to install missing modules")
        );
    }

    #[test]
    fn fatal_files_show_first_diagnostic_line() {
        let rendered = render(&report(
            RunStop::Reported,
            vec![
                FileOutcome::fatal("/p/a.js", "\n/p/a.js:3\nSyntaxError: nope\n"),
                FileOutcome::timeout("/p/b.js"),
            ],
        ));
        assert!(rendered.contains("fatal crashes from:"));
        assert!(rendered.contains("  /p/a.js: /p/a.js:3"));
        assert!(rendered.contains("  /p/b.js: timed out"));
        assert_eq!(rendered.lines().last(), Some("fix the files above and re-run"));
    }

    #[test]
    fn aborted_runs_name_their_reason() {
        let gave_up = render(&report(RunStop::GaveUp { attempts: 2 }, Vec::new()));
        assert_eq!(gave_up.lines().last(), Some("gave up after 2 tries"));

        let mut failed = report(
            RunStop::InstallFailed {
                modules: vec!["left-pad".to_string()],
                error: "npm install --save left-pad failed\nE404".to_string(),
            },
            Vec::new(),
        );
        failed.actions.push(PackageAction {
            kind: PackageActionKind::Add(vec!["left-pad".to_string()]),
            error: Some("npm install --save left-pad failed\nE404".to_string()),
        });
        let rendered = render(&failed);
        assert!(rendered.contains("add left-pad: failed (npm install --save left-pad failed)"));
        assert_eq!(
            rendered.lines().last(),
            Some("could not add left-pad: npm install --save left-pad failed")
        );

        let unreadable = render(&report(
            RunStop::PathUnreadable {
                path: PathBuf::from("/p"),
                reason: "No such file or directory".to_string(),
            },
            Vec::new(),
        ));
        assert_eq!(
            unreadable.lines().last(),
            Some("could not inspect path /p: No such file or directory")
        );
        assert!(!unreadable.contains("checked"));
    }

    #[test]
    fn freshness_lists_candidates() {
        let mut report = report(RunStop::Clean, Vec::new());
        report.freshness = Some(FreshnessReport {
            candidates: vec![UpgradeCandidate {
                name: "chalk".to_string(),
                installed: "2.4.2".to_string(),
                latest: "5.3.0".to_string(),
            }],
            checked: 1,
            skipped: 0,
            upgraded: None,
        });
        let rendered = render(&report);
        assert!(rendered.contains("freshness: 1 package(s) compared, 0 skipped"));
        assert!(rendered.contains("  chalk: 2.4.2 -> 5.3.0"));
        assert!(rendered.contains("re-run with --force to upgrade"));
        assert_eq!(rendered.lines().last(), Some("no problems."));
    }
}
