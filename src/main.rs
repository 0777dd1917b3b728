// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging
// 3. Run every input URL through the worker pool
// 4. Print the handles, in input order, as JSON or as a table
// 5. Exit with proper code (0 = all scanned, 1 = some failed, 2 = error)
// =============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use handle_scout::batch::{BatchReport, Outcome, WorkerPool};
use handle_scout::cli::Cli;
use handle_scout::fetch::HttpFetcher;
use handle_scout::logging;
use std::sync::Arc;
use tracing::{info_span, warn};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = every website was scanned
//   Ok(1) = at least one website could not be scanned
//   Err   = we couldn't even start (bad flags, unreadable input file, ...)
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    logging::init_logging(cli.verbose)?;

    let fetch_config = cli.fetch_config()?;
    let pool_config = cli.pool_config();
    let urls = cli.url_source()?;

    let fetcher = HttpFetcher::new(fetch_config).context("failed to create HTTP client")?;
    let pool = WorkerPool::new(pool_config.clone(), Arc::new(fetcher))
        .with_span(info_span!("batch", workers = pool_config.workers));

    let report = pool.run(urls).await;
    if report.is_empty() {
        warn!("No URLs were given; pass them as arguments, with --input, or on stdin");
    }

    print_results(&report, cli.json)?;

    if report.failed() > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

// JSON output is one entry per input URL: the handles found, or null if the
// page couldn't be scanned
fn print_results(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(&report.handle_maps())?;
        println!("{}", json_output);
    } else {
        print_table(report);
    }
    Ok(())
}

fn print_table(report: &BatchReport) {
    println!("{:<4} {:<40} {:<18} {:<50}", "#", "URL", "STATUS", "HANDLES");
    println!("{}", "=".repeat(114));

    for record in &report.records {
        let url_display = if record.url.chars().count() > 37 {
            format!("{}...", record.url.chars().take(37).collect::<String>())
        } else {
            record.url.clone()
        };

        let (status, details) = match &record.outcome {
            Outcome::Success { handles, status, .. } => {
                let found = if handles.is_empty() {
                    "-".to_string()
                } else {
                    handles
                        .iter()
                        .map(|(platform, id)| format!("{}={}", platform, id))
                        .collect::<Vec<_>>()
                        .join(" ")
                };
                (format!("HTTP {}", status), found)
            }
            Outcome::Failure { kind, detail, .. } => (kind.to_string(), detail.clone()),
        };

        println!("{:<4} {:<40} {:<18} {:<50}", record.position, url_display, status, details);
    }

    println!();

    let failed = report.failed();
    println!("Summary:");
    println!("   Scanned: {}", report.len() - failed);
    println!("   Failed:  {}", failed);
    println!("   Total:   {}", report.len());
}
