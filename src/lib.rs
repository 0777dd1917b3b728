// src/lib.rs
// =============================================================================
// handle-scout as a library: everything except argument parsing lives here so
// main.rs stays a thin wrapper.
//
// Modules:
// - extract: URL normalizing, handle matching, HTML scanning (no I/O)
// - fetch: the HTTP client
// - batch: worker pool, task queue and result ordering
// - cli: command-line flags and input reading
// - logging: log output setup
// =============================================================================

pub mod batch;
pub mod cli;
pub mod extract;
pub mod fetch;
pub mod logging;
