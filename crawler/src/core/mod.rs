//! Deterministic, pure logic shared by the crawler.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod decision;
pub mod run_state;
pub mod types;
pub mod version;
