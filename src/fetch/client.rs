// src/fetch/client.rs
// =============================================================================
// This module downloads one page.
//
// Key functionality:
// - One GET request per page, with a browser-like User-Agent (a lot of sites
//   reject the default reqwest one)
// - A fixed timeout for the whole request, body included
// - Redirects are followed by hand so every hop's status is recorded instead
//   of disappearing inside the HTTP client
// - Failures are classified: timeout, connection, HTTP status, ...
//
// There are no retries. A 503 is reported as "probably blocked as a bot" and
// left to the caller.
// =============================================================================

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const BOT_BLOCK_HINT: &str =
    "503 responses are likely due to being identified as non-human traffic, or gated content";

// Fetch client configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            user_agent: BROWSER_USER_AGENT.to_string(),
            max_redirects: 10,
        }
    }
}

// One redirect that was followed on the way to the final page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectHop {
    pub status: u16,
    pub location: String,
}

// A successfully downloaded page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL after all redirects were followed
    pub final_url: Url,
    /// Status of the final response (always 2xx)
    pub status: u16,
    /// Redirects followed, in order
    pub redirects: Vec<RedirectHop>,
    /// The Content-Type header, if any
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchedPage {
    pub fn charset(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(crate::extract::declared_charset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("{url} redirected more than {limit} times")]
    TooManyRedirects { url: String, limit: usize },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_likely_bot_block(&self) -> bool {
        self.status() == Some(StatusCode::SERVICE_UNAVAILABLE.as_u16())
    }

    // Extra text for operators, if we have any
    pub fn hint(&self) -> Option<&'static str> {
        self.is_likely_bot_block().then_some(BOT_BLOCK_HINT)
    }
}

// Anything that can turn a URL into a page
//
// The worker pool only talks to this trait, so tests can hand it canned
// pages instead of a network
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

// The real, reqwest backed page source
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        // Redirects are handled in fetch() so we can record them
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        // Parse first so a bad URL never reaches the network
        let mut current = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut redirects = Vec::new();

        loop {
            debug!(url = %current, "Sending request");

            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| categorize_error(&current, e))?;

            let status = response.status();

            // Follow redirects by hand so every hop is recorded
            if is_followed_redirect(status) {
                if redirects.len() >= self.config.max_redirects {
                    return Err(FetchError::TooManyRedirects {
                        url: url.to_string(),
                        limit: self.config.max_redirects,
                    });
                }

                // A redirect without somewhere to go is just a failed response
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| FetchError::HttpStatus {
                        url: current.to_string(),
                        status: status.as_u16(),
                    })?;

                let next = current.join(location).map_err(|e| FetchError::InvalidUrl {
                    url: location.to_string(),
                    reason: e.to_string(),
                })?;

                debug!(from = %current, to = %next, status = status.as_u16(), "Following redirect");

                redirects.push(RedirectHop {
                    status: status.as_u16(),
                    location: next.to_string(),
                });
                current = next;
                continue;
            }

            // Check the final status
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }

            // Read the whole body; the scanner decides what to do with it
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let body = response
                .bytes()
                .await
                .map_err(|e| categorize_error(&current, e))?;

            debug!(
                url = %current,
                status = status.as_u16(),
                redirects = redirects.len(),
                size = body.len(),
                "Page downloaded"
            );

            return Ok(FetchedPage {
                final_url: current,
                status: status.as_u16(),
                redirects,
                content_type,
                body,
            });
        }
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

// Sorts reqwest errors into our error kinds
//
// Timeouts are checked first: reqwest can flag a timed out connect as both
// is_timeout() and is_connect()
fn categorize_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_builder() {
        FetchError::InvalidUrl {
            url: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        FetchError::Connection {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(config: FetchConfig) -> HttpFetcher {
        HttpFetcher::new(config).unwrap()
    }

    #[test]
    fn test_fetch_config_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.max_redirects, 10);
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn test_fetch_sends_configured_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", "handle-scout-test/1.0"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let config = FetchConfig {
            user_agent: "handle-scout-test/1.0".to_string(),
            ..FetchConfig::default()
        };
        let page = fetcher(config)
            .fetch(&format!("{}/", server.uri()))
            .await
            .unwrap();

        assert_eq!(page.status, 200);
        assert!(page.redirects.is_empty());
        assert_eq!(page.charset().as_deref(), Some("utf-8"));
        assert_eq!(&page.body[..], b"<html></html>");
    }

    #[tokio::test]
    async fn test_fetch_records_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/moved"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/moved"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("ok", "text/html"))
            .mount(&server)
            .await;

        let page = fetcher(FetchConfig::default())
            .fetch(&format!("{}/old", server.uri()))
            .await
            .unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.final_url.path(), "/new");
        let statuses: Vec<u16> = page.redirects.iter().map(|hop| hop.status).collect();
        assert_eq!(statuses, vec![301, 302]);
    }

    #[tokio::test]
    async fn test_fetch_stops_redirect_loops() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
            .mount(&server)
            .await;

        let config = FetchConfig {
            max_redirects: 3,
            ..FetchConfig::default()
        };
        let error = fetcher(config)
            .fetch(&format!("{}/loop", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(error, FetchError::TooManyRedirects { limit: 3, .. }));
    }

    #[tokio::test]
    async fn test_fetch_follows_temporary_and_permanent_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(307).insert_header("Location", "/b"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(308).insert_header("Location", "/c"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(ResponseTemplate::new(303).insert_header("Location", "/done"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/done"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("ok", "text/html"))
            .mount(&server)
            .await;

        let page = fetcher(FetchConfig::default())
            .fetch(&format!("{}/a", server.uri()))
            .await
            .unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.final_url.path(), "/done");
        let statuses: Vec<u16> = page.redirects.iter().map(|hop| hop.status).collect();
        assert_eq!(statuses, vec![307, 308, 303]);
        assert_eq!(page.redirects[0].location, format!("{}/b", server.uri()));
    }

    #[tokio::test]
    async fn test_fetch_redirect_without_location_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nowhere"))
            .respond_with(ResponseTemplate::new(302))
            .mount(&server)
            .await;

        let error = fetcher(FetchConfig::default())
            .fetch(&format!("{}/nowhere", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(error, FetchError::HttpStatus { status: 302, .. }), "got {:?}", error);
        assert_eq!(error.status(), Some(302));
    }

    #[tokio::test]
    async fn test_fetch_http_error_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gated"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = fetcher(FetchConfig::default());

        let missing = client.fetch(&format!("{}/missing", server.uri())).await.unwrap_err();
        assert_eq!(missing.status(), Some(404));
        assert!(!missing.is_likely_bot_block());
        assert_eq!(missing.hint(), None);

        let gated = client.fetch(&format!("{}/gated", server.uri())).await.unwrap_err();
        assert_eq!(gated.status(), Some(503));
        assert!(gated.is_likely_bot_block());
        assert!(gated.hint().is_some());
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_distinguished() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let config = FetchConfig {
            timeout: Duration::from_millis(200),
            ..FetchConfig::default()
        };
        let error = fetcher(config).fetch(&server.uri()).await.unwrap_err();

        assert!(matches!(error, FetchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Nothing listens on port 1
        let error = fetcher(FetchConfig::default())
            .fetch("http://127.0.0.1:1/")
            .await
            .unwrap_err();

        assert!(matches!(error, FetchError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_fetch_unparseable_url() {
        let error = fetcher(FetchConfig::default())
            .fetch("https://exa mple.com")
            .await
            .unwrap_err();

        assert!(matches!(error, FetchError::InvalidUrl { .. }));
    }
}
