// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate, and
// turns the input (arguments, a file, or stdin) into a stream of URLs.
//
// The URL stream is lazy: a file is read one line at a time while the
// workers are already busy with the first URLs.
// =============================================================================

use crate::batch::{PoolConfig, DEFAULT_WORKERS};
use crate::fetch::FetchConfig;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(
    name = "handle-scout",
    version = "0.1.0",
    about = "Finds Facebook, Twitter, App Store and Google Play handles linked from websites",
    long_about = "handle-scout fetches every website you give it (concurrently), looks at the \
                  links on each page and prints the social media and app store handles it \
                  finds, in the same order as the input."
)]
pub struct Cli {
    /// Websites to scan (e.g. zynga.com or https://www.zello.com/)
    pub urls: Vec<String>,

    /// Read websites from a file, one per line ("-" for stdin)
    ///
    /// Blank lines and lines starting with '#' are skipped
    #[arg(long, short, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output results in JSON format instead of a table
    #[arg(long)]
    pub json: bool,

    /// Number of pages fetched at the same time
    #[arg(long, short, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 3.0)]
    pub timeout_secs: f64,

    /// User-Agent header sent with every request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Maximum number of redirects followed per page
    #[arg(long, default_value_t = 10)]
    pub max_redirects: usize,

    /// Show debug logs
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    pub fn fetch_config(&self) -> Result<FetchConfig> {
        let timeout = Duration::try_from_secs_f64(self.timeout_secs)
            .with_context(|| format!("invalid timeout: {}", self.timeout_secs))?;
        if timeout.is_zero() {
            bail!("timeout must be greater than zero");
        }

        let mut config = FetchConfig {
            timeout,
            max_redirects: self.max_redirects,
            ..FetchConfig::default()
        };
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        Ok(config)
    }

    pub fn pool_config(&self) -> PoolConfig {
        if self.workers == 0 {
            warn!("--workers 0 is not allowed, using 1");
        }
        PoolConfig::with_workers(self.workers)
    }

    // All input URLs, positional arguments first
    pub fn url_source(&self) -> Result<Box<dyn Iterator<Item = String> + Send>> {
        let positional = self.urls.clone().into_iter();

        let Some(path) = &self.input else {
            if self.urls.is_empty() {
                bail!("no websites given: pass URLs as arguments or use --input <FILE>");
            }
            return Ok(Box::new(positional));
        };

        let reader: Box<dyn BufRead + Send> = if path.as_os_str() == "-" {
            Box::new(BufReader::new(io::stdin()))
        } else {
            let file = File::open(path)
                .with_context(|| format!("could not open input file {}", path.display()))?;
            Box::new(BufReader::new(file))
        };

        Ok(Box::new(positional.chain(read_urls(reader))))
    }
}

// Lazily yields the URLs in a reader
//
// A read error ends the input early; what was read so far is still scanned
pub fn read_urls<R: BufRead>(reader: R) -> impl Iterator<Item = String> {
    reader
        .lines()
        .map_while(|line| match line {
            Ok(line) => Some(line),
            Err(e) => {
                warn!(error = %e, "Stopped reading input");
                None
            }
        })
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_urls_skips_blank_and_comments() {
        let input = "zynga.com\n\n# competitors\n  https://www.zello.com/  \n";
        let urls: Vec<String> = read_urls(input.as_bytes()).collect();
        assert_eq!(urls, vec!["zynga.com", "https://www.zello.com/"]);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["handle-scout", "zynga.com"]);
        assert_eq!(cli.workers, 15);
        assert!(!cli.json);

        let config = cli.fetch_config().unwrap();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.max_redirects, 10);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "handle-scout",
            "--workers",
            "4",
            "--timeout-secs",
            "0.5",
            "--user-agent",
            "test-agent",
            "zynga.com",
        ]);
        let config = cli.fetch_config().unwrap();
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(cli.pool_config().workers, 4);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cli = Cli::parse_from(["handle-scout", "--timeout-secs", "0", "zynga.com"]);
        assert!(cli.fetch_config().is_err());
    }

    #[test]
    fn test_no_input_is_an_error() {
        let cli = Cli::parse_from(["handle-scout"]);
        assert!(cli.url_source().is_err());
    }
}
