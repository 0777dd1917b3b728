// src/extract/mod.rs
// =============================================================================
// This module contains everything that works on text, with no networking:
//
// Submodules:
// - normalize: Turns a raw input line into a fetchable URL
// - matcher: Decides whether one link is a social media / app store handle
// - scanner: Runs the matcher over every link of an HTML page
// =============================================================================

mod matcher;
mod normalize;
mod scanner;

pub use matcher::{match_handle, match_url, Handle, MatchError, Platform};
pub use normalize::{normalize_url, NormalizeError};
pub use scanner::{declared_charset, scan_page, HandleMap, LinkScanner, ScanReport};
