// src/logging.rs
// =============================================================================
// Sets up log output for the binary.
//
// Logs go to stderr so `--json` output on stdout can be piped straight into
// another tool. RUST_LOG overrides the defaults, e.g.
//   RUST_LOG=handle_scout=trace handle-scout zynga.com
// =============================================================================

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), verbose);

    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

// RUST_LOG wins when it is set and parses; otherwise our crate logs at
// info (debug with --verbose) and everything else at warn
fn build_filter(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        match EnvFilter::try_new(directives) {
            Ok(filter) => return filter,
            Err(e) => eprintln!("Ignoring invalid RUST_LOG '{}': {}", directives, e),
        }
    }

    let level = if verbose { "debug" } else { "info" };
    EnvFilter::new(format!("handle_scout={},warn", level))
}
