//! Side-effecting helpers: filesystem walks, child processes, package
//! manager and registry access.

pub mod config;
pub mod discovery;
pub mod manifest;
pub mod package_manager;
pub mod process;
pub mod registry;
pub mod supervisor;
