// src/extract/scanner.rs
// =============================================================================
// This module scans one HTML page for handles.
//
// How it works:
// 1. Check the Content-Type. Anything that isn't text/html gives an empty
//    result (that's not an error, there's just nothing to scan)
// 2. Decode the body using the declared charset
// 3. Walk every <a href> in document order and run the matcher on it
// 4. Later links overwrite earlier ones for the same platform
//
// A LinkScanner holds the state for exactly one page. Workers build a fresh
// one per page, so two pages can never leak handles into each other.
// =============================================================================

use super::matcher::{match_url, Platform};
use encoding_rs::Encoding;
use scraper::{Html, Selector};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::Url;

// platform -> identifier, for a single page
pub type HandleMap = BTreeMap<Platform, String>;

// What scanning one page produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub handles: HandleMap,
    /// Number of <a href> elements looked at
    pub links_seen: usize,
    /// App store links that didn't have the expected shape
    pub malformed_links: usize,
}

pub struct LinkScanner {
    base: Option<Url>,
    selector: Selector,
    report: ScanReport,
}

impl LinkScanner {
    // Creates a scanner for one page
    //
    // base is the page's own URL; relative hrefs are resolved against it
    pub fn new(base: Option<Url>) -> Self {
        Self {
            base,
            // The selector is a constant, so parsing it can't fail at runtime
            selector: Selector::parse("a[href]").expect("'a[href]' is a valid selector"),
            report: ScanReport::default(),
        }
    }

    // Feeds an HTML document into the scanner
    pub fn feed(&mut self, html: &str) {
        let document = Html::parse_document(html);

        for element in document.select(&self.selector) {
            if let Some(href) = element.value().attr("href") {
                visit_href(self.base.as_ref(), &mut self.report, href);
            }
        }
    }

    pub fn finish(self) -> ScanReport {
        self.report
    }
}

fn visit_href(base: Option<&Url>, report: &mut ScanReport, href: &str) {
    report.links_seen += 1;

    let Some(url) = resolve_href(base, href) else {
        return;
    };

    match match_url(&url) {
        Ok(Some(handle)) => {
            debug!(platform = %handle.platform, identifier = %handle.identifier, "Handle found");
            report.handles.insert(handle.platform, handle.identifier);
        }
        Ok(None) => {}
        Err(e) => {
            report.malformed_links += 1;
            warn!(href, error = %e, "Skipping malformed app store link");
        }
    }
}

// Scans a fetched page
//
// Parameters:
//   body: raw response bytes
//   content_type: the Content-Type header, if the server sent one
//   base: the page URL, for resolving relative links
pub fn scan_page(body: &[u8], content_type: Option<&str>, base: Option<&Url>) -> ScanReport {
    // Only HTML pages can contain anchors worth scanning
    let Some(content_type) = content_type.filter(|ct| is_html(ct)) else {
        debug!(?content_type, "Not an HTML page, skipping scan");
        return ScanReport::default();
    };

    // Decode with the declared charset, then walk the anchors
    let html = decode_body(body, declared_charset(content_type).as_deref());

    let mut scanner = LinkScanner::new(base.cloned());
    scanner.feed(&html);
    scanner.finish()
}

fn is_html(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}

// "text/html; charset=UTF-8" -> Some("utf-8")
pub fn declared_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (!value.is_empty()).then(|| value.to_ascii_lowercase())
        } else {
            None
        }
    })
}

// Turns the body into text
//
// - declared UTF-8: decoded as UTF-8 (invalid bytes become U+FFFD)
// - another charset encoding_rs knows: decoded with that charset
// - nothing declared, or an unknown label: treated as UTF-8 as well
fn decode_body<'a>(body: &'a [u8], charset: Option<&str>) -> Cow<'a, str> {
    match charset {
        Some("utf-8") | Some("utf8") | None => String::from_utf8_lossy(body),
        Some(label) => match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => encoding.decode(body).0,
            None => {
                debug!(charset = label, "Unknown charset, decoding as UTF-8");
                String::from_utf8_lossy(body)
            }
        },
    }
}

// Makes an href absolute
//
// Anchors and pseudo links (mailto:, javascript:) are dropped straight away
fn resolve_href(base: Option<&Url>, href: &str) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    match Url::parse(href) {
        Ok(url) => Some(url),
        Err(_) => base?.join(href).ok(),
    }
}
