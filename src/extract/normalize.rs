// src/extract/normalize.rs
// =============================================================================
// This module turns a raw input line into something we can fetch.
//
// The policy here is deliberately permissive. It is NOT a URL validator:
// - anything without a '.' is rejected (it can't be a domain)
// - anything without a scheme gets "https://" in front of it
// - everything else is passed through untouched
//
// Strings that survive this step can still fail to parse later. The fetch
// client reports those as InvalidUrl too, so the caller sees one error kind
// for "this input is not a usable URL".
// =============================================================================

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("input is empty")]
    Empty,

    #[error("'{0}' does not look like a domain (no '.')")]
    NoDot(String),
}

// Normalizes a raw URL string
//
// Returns: Ok(url) with a scheme, or the reason the input was rejected
//
// Examples:
//   "nasa.gov"              -> Ok("https://nasa.gov")
//   "http://www.zello.com/" -> Ok("http://www.zello.com/")
//   "localhost"             -> Err(NoDot)
pub fn normalize_url(raw: &str) -> Result<String, NormalizeError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(NormalizeError::Empty);
    }

    if !trimmed.contains('.') {
        return Err(NormalizeError::NoDot(trimmed.to_string()));
    }

    if has_scheme(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("https://{}", trimmed))
    }
}

// "example.com:8080" would parse as scheme "example.com", so we only treat
// the text before "://" as a scheme
fn has_scheme(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
