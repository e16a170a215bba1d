//! Service API error types

use thiserror::Error;

/// HTTP status the service returns while its engine is still initializing
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Service error with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// HTTP status, present only for `ApiErrorKind::Http`
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// No response was received
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Transport, message)
    }

    /// A response arrived with a non-success status
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            status: Some(status),
            message: message.into(),
        }
    }

    /// A success response whose body could not be understood
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Parse, message)
    }

    /// Whether the dispatch retry loop should try again
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ApiErrorKind::Transport => true,
            ApiErrorKind::Http => self.status == Some(SERVICE_UNAVAILABLE),
            ApiErrorKind::Parse => false,
        }
    }
}

/// Error classification for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Connection refused, reset, DNS failure - no status was received
    Transport,
    /// Non-2xx status. 503 is retryable, everything else is terminal
    Http,
    /// Malformed or missing success body
    Parse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ApiError::transport("connection refused").is_retryable());
        assert!(ApiError::http(503, "engine not initialized").is_retryable());
        assert!(!ApiError::http(500, "boom").is_retryable());
        assert!(!ApiError::http(400, "bad request").is_retryable());
        assert!(!ApiError::parse("missing choices").is_retryable());
    }

    #[test]
    fn test_display_is_message() {
        let err = ApiError::http(404, "API error (404 Not Found): no such route");
        assert_eq!(err.to_string(), "API error (404 Not Found): no such route");
        assert_eq!(err.status, Some(404));
    }
}
