//! Deterministic classification of a finished child process.
//!
//! The interpreter's free-text diagnostics are only parsed here, so the
//! fragile part (the exact wording of a module resolution failure) stays in
//! one place.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::FileStatus;

static MODULE_NOT_FOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Cannot find (?:module|package) ['"]([^'"]+)['"]"#).unwrap());

/// Extensions that mark a missing name as a file rather than a package.
const LOCAL_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs", ".json", ".node", ".ts"];

/// Classify a finished process. First match wins:
///
/// 1. timed out → `Timeout` (a killed process may leave truncated stderr)
/// 2. module resolution failure naming a package → `MissingDependency`
/// 3. failed exit (non-zero code, or killed by a signal) → `FatalError`
/// 4. otherwise → `Clean`
pub fn classify(exit_code: Option<i32>, stderr: &str, timed_out: bool) -> FileStatus {
    if timed_out {
        return FileStatus::Timeout;
    }
    if let Some(MissingModule::Package(name)) = extract_missing_module(stderr) {
        return FileStatus::MissingDependency(name);
    }
    if exit_code != Some(0) {
        return FileStatus::FatalError(stderr.to_string());
    }
    FileStatus::Clean
}

/// Name reported by a module resolution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingModule {
    /// External package, normalised to its root (`lodash/fp` → `lodash`).
    Package(String),
    /// Relative, absolute or file-like reference; not installable.
    Local(String),
}

/// Find the first module resolution failure in `stderr`.
///
/// Relative, absolute and file-like names are `Local`; anything else is a
/// package reduced to its root, so `lodash/fp` installs `lodash` and
/// `@scope/pkg/sub` installs `@scope/pkg`.
pub fn extract_missing_module(stderr: &str) -> Option<MissingModule> {
    let captures = MODULE_NOT_FOUND.captures(stderr)?;
    let name = captures.get(1)?.as_str().trim();
    if name.is_empty() {
        return None;
    }
    if is_local_reference(name) {
        return Some(MissingModule::Local(name.to_string()));
    }
    Some(MissingModule::Package(package_root(name)))
}

fn is_local_reference(name: &str) -> bool {
    name.starts_with('.')
        || name.starts_with('/')
        || name.contains('\\')
        || LOCAL_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

fn package_root(name: &str) -> String {
    let mut segments = name.split('/');
    match (segments.next(), segments.next()) {
        (Some(scope), Some(pkg)) if scope.starts_with('@') => format!("{scope}/{pkg}"),
        (Some(first), _) => first.to_string(),
        _ => name.to_string(),
    }
}
