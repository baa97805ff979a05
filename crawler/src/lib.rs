//! Codebase health crawler.
//!
//! Runs every script of a project in its own short-lived interpreter
//! process, classifies how each one ended, and, when asked to, installs the
//! packages they could not resolve before checking again. The architecture
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (classification, aggregation,
//!   the retry decision). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem walks, child
//!   processes, package manager and registry access). Isolated behind traits
//!   to enable fakes in tests.
//!
//! Orchestration modules ([`orchestrator`], [`freshness`], [`report`]) tie
//! core logic to I/O to implement the CLI.

pub mod core;
pub mod exit_codes;
pub mod freshness;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod pool;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
