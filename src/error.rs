//! Error types for taskbridge
//!
//! Defines a comprehensive error enum covering all failure modes across the system.
//! Uses thiserror for ergonomic error handling.

use crate::platforms::Platform;
use thiserror::Error;

/// Result type alias for taskbridge operations
pub type Result<T> = std::result::Result<T, TaskBridgeError>;

/// Comprehensive error type for taskbridge operations
#[derive(Error, Debug)]
pub enum TaskBridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Platform API request errors (ClickUp, Monday)
    #[error(transparent)]
    Platform(#[from] PlatformRequestError),

    /// A run that could not fetch its source tasks at all
    #[error("Sync run aborted: {message}")]
    RunAborted {
        message: String,
        /// Category of the underlying platform failure, when there was one
        kind: Option<RequestErrorKind>,
        /// The failed run log, for callers that persist or display it
        log: Box<crate::sync::SyncRunLog>,
    },

    /// Malformed platform payload (missing id/name, wrong shape)
    #[error("Payload error: {0}")]
    Payload(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

/// Category of a platform-reported request failure.
///
/// The Sync Engine uses this to decide per-task-skip vs run-abort, and the
/// retry wrapper uses it to decide whether a whole run is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// HTTP 401 - invalid or expired token
    Unauthorized,
    /// HTTP 403 - insufficient permissions
    Forbidden,
    /// HTTP 429 - too many requests
    RateLimited,
    /// HTTP 404 - resource does not exist
    NotFound,
    /// Anything else the platform reports
    Generic,
}

impl RequestErrorKind {
    /// Classify an HTTP status code per the adapter contract.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 => RequestErrorKind::Unauthorized,
            403 => RequestErrorKind::Forbidden,
            429 => RequestErrorKind::RateLimited,
            404 => RequestErrorKind::NotFound,
            _ => RequestErrorKind::Generic,
        }
    }
}

impl std::fmt::Display for RequestErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RequestErrorKind::Unauthorized => "unauthorized",
            RequestErrorKind::Forbidden => "forbidden",
            RequestErrorKind::RateLimited => "rate limited",
            RequestErrorKind::NotFound => "not found",
            RequestErrorKind::Generic => "generic",
        };
        f.write_str(label)
    }
}

/// Error returned by every network-facing adapter operation.
#[derive(Error, Debug)]
#[error("{platform} API error ({kind}): {message}")]
pub struct PlatformRequestError {
    pub platform: Platform,
    pub kind: RequestErrorKind,
    pub message: String,
    /// Seconds from a Retry-After header, when the platform sent one
    pub retry_after: Option<u64>,
}

impl PlatformRequestError {
    pub fn new(platform: Platform, kind: RequestErrorKind, message: impl Into<String>) -> Self {
        Self {
            platform,
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, secs: Option<u64>) -> Self {
        self.retry_after = secs;
        self
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == RequestErrorKind::Unauthorized
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == RequestErrorKind::RateLimited
    }
}

impl crate::retry::RetryableError for TaskBridgeError {
    fn retry_decision(&self) -> crate::retry::RetryDecision {
        use crate::retry::RetryDecision;
        use std::time::Duration;

        match self {
            TaskBridgeError::Platform(e) => match e.kind {
                RequestErrorKind::RateLimited => {
                    RetryDecision::RetryAfter(Duration::from_secs(e.retry_after.unwrap_or(60)))
                }
                RequestErrorKind::Generic => RetryDecision::Retry,
                _ => RetryDecision::NoRetry,
            },
            TaskBridgeError::RunAborted { kind, .. } => match kind {
                Some(RequestErrorKind::RateLimited) => {
                    RetryDecision::RetryAfter(Duration::from_secs(60))
                }
                Some(RequestErrorKind::Generic) | None => RetryDecision::Retry,
                Some(_) => RetryDecision::NoRetry,
            },
            TaskBridgeError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else if let Some(status) = e.status() {
                    match status.as_u16() {
                        429 => RetryDecision::RetryAfter(Duration::from_secs(60)),
                        500..=599 => RetryDecision::Retry,
                        _ => RetryDecision::NoRetry,
                    }
                } else {
                    RetryDecision::NoRetry
                }
            }
            _ => RetryDecision::NoRetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{RetryDecision, RetryableError};
    use reqwest::StatusCode;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            RequestErrorKind::from_status(StatusCode::UNAUTHORIZED),
            RequestErrorKind::Unauthorized
        );
        assert_eq!(
            RequestErrorKind::from_status(StatusCode::FORBIDDEN),
            RequestErrorKind::Forbidden
        );
        assert_eq!(
            RequestErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS),
            RequestErrorKind::RateLimited
        );
        assert_eq!(
            RequestErrorKind::from_status(StatusCode::NOT_FOUND),
            RequestErrorKind::NotFound
        );
        assert_eq!(
            RequestErrorKind::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            RequestErrorKind::Generic
        );
        assert_eq!(
            RequestErrorKind::from_status(StatusCode::BAD_REQUEST),
            RequestErrorKind::Generic
        );
    }

    #[test]
    fn test_rate_limited_retry_decision() {
        let err = TaskBridgeError::Platform(
            PlatformRequestError::new(Platform::ClickUp, RequestErrorKind::RateLimited, "slow down")
                .with_retry_after(Some(30)),
        );
        assert_eq!(
            err.retry_decision(),
            RetryDecision::RetryAfter(std::time::Duration::from_secs(30))
        );
    }

    #[test]
    fn test_unauthorized_is_not_retried() {
        let err = TaskBridgeError::Platform(PlatformRequestError::new(
            Platform::Monday,
            RequestErrorKind::Unauthorized,
            "bad token",
        ));
        assert_eq!(err.retry_decision(), RetryDecision::NoRetry);
    }

    #[test]
    fn test_platform_error_display() {
        let err = PlatformRequestError::new(
            Platform::ClickUp,
            RequestErrorKind::NotFound,
            "no such list",
        );
        let text = err.to_string();
        assert!(text.contains("not found"));
        assert!(text.contains("no such list"));
    }
}
