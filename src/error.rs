//! Custom error types for kbctl

use serde::Serialize;
use thiserror::Error;

/// Main error type for kbctl operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Search backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Invalid index schema: {0}")]
    Validation(#[from] ValidationError),

    #[error("Request rejected by backend (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("Index {index} is at version {found}, not {target}; rerun reconcile once the old index is gone")]
    VersionConflict {
        index: String,
        found: String,
        target: String,
    },

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Ingestion API error: {0}")]
    Ingestion(String),

    #[error("Unexpected backend response (HTTP {status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for kbctl
pub type Result<T> = std::result::Result<T, Error>;

/// Schema validation failures. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("field '{field}' has type '{found}', expected '{expected}'")]
    WrongFieldType {
        field: String,
        expected: String,
        found: String,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Failure classes surfaced to operators, each with its own remedy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authorization,
    BackendUnavailable,
    Validation,
    Unknown,
}

impl ErrorKind {
    /// Recommended operator action for this class of failure
    pub fn remedy(&self) -> &'static str {
        match self {
            ErrorKind::Authorization => {
                "Check that the caller's credentials are granted access to the search collection \
                 (role policies and the collection's data access policy)."
            }
            ErrorKind::BackendUnavailable => {
                "The search collection is probably still provisioning. Retry later."
            }
            ErrorKind::Validation => "Fix the index definition; retrying the same request cannot succeed.",
            ErrorKind::Unknown => "Inspect the logs for the full error context.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Authorization => write!(f, "authorization"),
            ErrorKind::BackendUnavailable => write!(f, "backend_unavailable"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl Error {
    /// Classify this error into the operator-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authorization(_) => ErrorKind::Authorization,
            Error::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Error::Validation(_) | Error::Rejected { .. } => ErrorKind::Validation,
            Error::Http(e) => classify_reqwest(e),
            _ => ErrorKind::Unknown,
        }
    }

    /// Only failures that look like a not-yet-ready backend are worth retrying
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::BackendUnavailable
    }

    /// Build an error from a non-success HTTP status and response body
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate_body(body);
        match status {
            401 | 403 => Error::Authorization(message),
            408 | 429 | 502 | 503 | 504 => Error::BackendUnavailable(message),
            404 => Error::IndexNotFound(message),
            400..=499 => {
                if body.contains("resource_already_exists_exception") {
                    Error::IndexAlreadyExists(message)
                } else {
                    Error::Rejected { status, message }
                }
            }
            _ => Error::Unexpected { status, message },
        }
    }
}

fn classify_reqwest(err: &reqwest::Error) -> ErrorKind {
    if err.is_connect() || err.is_timeout() {
        return ErrorKind::BackendUnavailable;
    }
    match err.status().map(|s| s.as_u16()) {
        Some(401) | Some(403) => ErrorKind::Authorization,
        Some(408) | Some(429) | Some(502) | Some(503) | Some(504) => {
            ErrorKind::BackendUnavailable
        }
        _ => ErrorKind::Unknown,
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 512;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        return trimmed.to_string();
    }
    let mut end = MAX;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
