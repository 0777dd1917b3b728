// src/extract/matcher.rs
// =============================================================================
// This module recognizes social media and app store links.
//
// Given one link, we answer: "is this a handle, and if so, whose?"
//
//   https://facebook.com/nasa                          -> (facebook, "nasa")
//   https://twitter.com/nasa/status/1                  -> (twitter, "nasa")
//   https://apps.apple.com/us/app/nasa/id334325516     -> (ios, "334325516")
//   https://play.google.com/store/apps/details?id=x.y  -> (google, "x.y")
//   https://example.com/                               -> no handle
//
// Rules are checked top to bottom and the first one that matches the host
// wins. Matching is a pure function: no I/O, no shared state.
// =============================================================================

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use url::Url;

// The platforms we know how to extract handles for
//
// Ord is derived so a BTreeMap<Platform, _> always iterates (and therefore
// serializes) in the same order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Twitter,
    Ios,
    Google,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
            Platform::Ios => "ios",
            Platform::Google => "google",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// One extracted handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub platform: Platform,
    pub identifier: String,
}

impl Handle {
    fn new(platform: Platform, identifier: impl Into<String>) -> Self {
        Self {
            platform,
            identifier: identifier.into(),
        }
    }
}

// An app store link that doesn't have the /app/<name>/id<digits> shape
//
// This is reported per link. A malformed link never aborts the scan of the
// page it was found on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("app store link has no 'app' path segment: {url}")]
    MissingAppSegment { url: String },

    #[error("app store link has no 'id' segment two after 'app' (found {found:?}): {url}")]
    MissingAppId { url: String, found: Option<String> },
}

// Matches a raw href (must be absolute)
//
// Relative hrefs have no host, so they can never be a handle
pub fn match_handle(href: &str) -> Result<Option<Handle>, MatchError> {
    match Url::parse(href) {
        Ok(url) => match_url(&url),
        Err(_) => Ok(None),
    }
}

// Matches an already parsed URL
//
// Returns:
//   Ok(Some(handle)) = the link points at a known platform
//   Ok(None)         = not a platform link (or nothing usable in it)
//   Err(..)          = an app store link we can't make sense of
pub fn match_url(url: &Url) -> Result<Option<Handle>, MatchError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Ok(None);
    }

    let host = match url.host_str() {
        Some(host) => host.to_ascii_lowercase(),
        None => return Ok(None),
    };

    if host.contains("facebook.com") {
        return Ok(first_path_segment(url).map(|id| Handle::new(Platform::Facebook, id)));
    }

    if host.contains("twitter.com") {
        return Ok(first_path_segment(url).map(|id| Handle::new(Platform::Twitter, id)));
    }

    if host.contains("apps.apple.com") || host.contains("itunes.apple.com") {
        return app_store_id(url).map(|id| Some(Handle::new(Platform::Ios, id)));
    }

    if host.contains("play.google.com") {
        return Ok(play_store_id(url).map(|id| Handle::new(Platform::Google, id)));
    }

    Ok(None)
}

// "/nasa/status/1" -> "nasa"
//
// An empty path ("https://twitter.com/") gives no handle
fn first_path_segment(url: &Url) -> Option<String> {
    let first = url.path().trim_matches('/').split('/').next()?;

    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

// "/us/app/nasa/id334325516" -> "334325516"
//
// The id lives two segments after "app"; the segment in between is the
// app's name, which we don't need
fn app_store_id(url: &Url) -> Result<String, MatchError> {
    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();

    let app_index = segments
        .iter()
        .position(|segment| *segment == "app")
        .ok_or_else(|| MatchError::MissingAppSegment {
            url: url.to_string(),
        })?;

    let candidate = segments.get(app_index + 2).copied();

    match candidate.and_then(|segment| segment.strip_prefix("id")) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(MatchError::MissingAppId {
            url: url.to_string(),
            found: candidate.map(str::to_string),
        }),
    }
}

// "?id=com.nasa.app&hl=en" -> "com.nasa.app"
//
// Only the first non-empty id counts. No id at all is simply "no handle".
fn play_store_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, value)| key == "id" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why Result<Option<Handle>, MatchError>?
//    - Ok(Some(..)) = found a handle
//    - Ok(None) = a normal link, nothing to see
//    - Err(..) = an app store link that's broken in a way worth reporting
//    - Three different answers, so the type has three shapes
//
// 2. What does strip_prefix do?
//    - "id334325516".strip_prefix("id") == Some("334325516")
//    - Returns None if the prefix isn't there, so we can't chop the wrong text
//
// 3. Why query_pairs() instead of splitting on '&'?
//    - It also decodes percent-escapes like %2E
// -----------------------------------------------------------------------------
