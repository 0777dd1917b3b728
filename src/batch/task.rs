// src/batch/task.rs
// =============================================================================
// The data that flows through a batch:
//
//   input URL --(producer)--> Task --(worker)--> ResultRecord --(aggregator)
//
// A Task is one input URL plus its position in the input. Each task ends as
// exactly one ResultRecord, whether it worked or not.
// =============================================================================

use crate::extract::{HandleMap, NormalizeError};
use crate::fetch::{FetchError, RedirectHop};
use serde::Serialize;
use std::fmt;

// One unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Index of the URL in the input, starting at 0
    pub position: usize,
    pub url: String,
}

// Why a task failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    Timeout,
    ConnectionError,
    HttpStatusError,
    TooManyRedirects,
    /// The worker died before it could record a result
    WorkerPanicked,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidUrl => "invalid URL",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionError => "connection error",
            ErrorKind::HttpStatusError => "HTTP error",
            ErrorKind::TooManyRedirects => "too many redirects",
            ErrorKind::WorkerPanicked => "worker panicked",
        };
        f.write_str(name)
    }
}

impl From<&FetchError> for ErrorKind {
    fn from(error: &FetchError) -> Self {
        match error {
            FetchError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            FetchError::Timeout { .. } => ErrorKind::Timeout,
            FetchError::Connection { .. } => ErrorKind::ConnectionError,
            FetchError::HttpStatus { .. } => ErrorKind::HttpStatusError,
            FetchError::TooManyRedirects { .. } => ErrorKind::TooManyRedirects,
        }
    }
}

// How a task ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        handles: HandleMap,
        /// Status of the final response, after redirects
        status: u16,
        redirects: Vec<RedirectHop>,
    },
    Failure {
        kind: ErrorKind,
        detail: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
}

impl Outcome {
    pub fn failure(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Outcome::Failure {
            kind,
            detail: detail.into(),
            status: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn handles(&self) -> Option<&HandleMap> {
        match self {
            Outcome::Success { handles, .. } => Some(handles),
            Outcome::Failure { .. } => None,
        }
    }
}

impl From<NormalizeError> for Outcome {
    fn from(error: NormalizeError) -> Self {
        Outcome::failure(ErrorKind::InvalidUrl, error.to_string())
    }
}

impl From<&FetchError> for Outcome {
    fn from(error: &FetchError) -> Self {
        let detail = match error.hint() {
            Some(hint) => format!("{} ({})", error, hint),
            None => error.to_string(),
        };

        Outcome::Failure {
            kind: ErrorKind::from(error),
            detail,
            status: error.status(),
        }
    }
}

// The result of one task, tagged with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub position: usize,
    pub url: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}
