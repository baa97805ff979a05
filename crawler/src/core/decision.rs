//! Pure decision step taken after every checking pass.

use crate::core::run_state::RunState;

/// What the orchestrator does once a pass has been aggregated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing erroring, nothing missing.
    Clean,
    /// Problems remain that will not be auto-fixed (fatal files only, or
    /// missing modules without `force`).
    Report,
    /// Add these modules, then re-crawl.
    Install(Vec<String>),
    /// Modules are still missing but the retry budget is spent.
    GiveUp,
}

/// Decide the transition out of `Deciding`.
///
/// Missing modules take precedence over fatal files: a pass with both still
/// installs, since the fatal files may only be collateral of the gap.
pub fn decide(state: &RunState, force: bool, max_retries: u32) -> Decision {
    if state.is_clean() {
        return Decision::Clean;
    }
    if state.missing_module_names.is_empty() || !force {
        return Decision::Report;
    }
    if state.attempt_count >= max_retries {
        return Decision::GiveUp;
    }
    Decision::Install(state.missing_modules())
}
