//! Per-attempt and terminal error types for the retry engine.

use std::fmt;

use super::classify::ErrorKind;

/// Error produced by a single request attempt (curl failure or HTTP error).
/// Kept as data so the classifier can inspect it before a retry decision,
/// prior to any conversion to anyhow at higher layers.
#[derive(Debug)]
pub enum RequestError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status. The body is kept for diagnostics.
    Http { status: u32, body: Vec<u8> },
    /// The request could not be built (bad path joined onto the base URL).
    InvalidUrl(url::ParseError),
    /// The request body could not be serialized to JSON.
    Body(serde_json::Error),
}

impl RequestError {
    /// HTTP status code, if this error carries one.
    pub fn status(&self) -> Option<u32> {
        match self {
            RequestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Curl(e) => write!(f, "{}", e),
            RequestError::Http { status, .. } => write!(f, "HTTP {}", status),
            RequestError::InvalidUrl(e) => write!(f, "invalid URL: {}", e),
            RequestError::Body(e) => write!(f, "request body: {}", e),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Curl(e) => Some(e),
            RequestError::InvalidUrl(e) => Some(e),
            RequestError::Body(e) => Some(e),
            RequestError::Http { .. } => None,
        }
    }
}

/// Terminal outcome of a retried operation. The original [`RequestError`] is
/// always preserved as the error source; `attempts` counts every invocation
/// of the operation, including the first.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// The failure was classified as non-retryable; the loop stopped on it
    /// without sleeping.
    #[error("non-retryable error ({kind:?}) after {attempts} attempt(s): {source}")]
    Fatal {
        kind: ErrorKind,
        attempts: u32,
        #[source]
        source: RequestError,
        /// Caller-supplied display message, passed through untouched.
        message: Option<String>,
    },
    /// The failure was retryable but the attempt budget ran out; `source` is
    /// the error from the last attempt.
    #[error("max retries exceeded ({kind:?}) after {attempts} attempt(s): {source}")]
    Exhausted {
        kind: ErrorKind,
        attempts: u32,
        #[source]
        source: RequestError,
        message: Option<String>,
    },
}

impl RetryError {
    /// Classification of the terminal failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RetryError::Fatal { kind, .. } | RetryError::Exhausted { kind, .. } => *kind,
        }
    }

    /// Total number of attempts made, including the first.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The error from the final attempt, unwrapped.
    pub fn request_error(&self) -> &RequestError {
        match self {
            RetryError::Fatal { source, .. } | RetryError::Exhausted { source, .. } => source,
        }
    }

    /// Caller-supplied display message, if any. Not interpreted by the engine.
    pub fn message(&self) -> Option<&str> {
        match self {
            RetryError::Fatal { message, .. } | RetryError::Exhausted { message, .. } => {
                message.as_deref()
            }
        }
    }

    /// Attach a caller-supplied display message to a terminal error.
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        match &mut self {
            RetryError::Fatal { message, .. } | RetryError::Exhausted { message, .. } => {
                *message = Some(msg.into());
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_displays_status() {
        let e = RequestError::Http { status: 503, body: Vec::new() };
        assert_eq!(e.to_string(), "HTTP 503");
        assert_eq!(e.status(), Some(503));
    }

    #[test]
    fn retry_error_preserves_source() {
        let err = RetryError::Exhausted {
            kind: ErrorKind::Server(503),
            attempts: 3,
            source: RequestError::Http { status: 503, body: Vec::new() },
            message: None,
        };
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.request_error().status(), Some(503));
        let src = std::error::Error::source(&err).expect("source");
        assert_eq!(src.to_string(), "HTTP 503");
    }

    #[test]
    fn with_message_is_pass_through() {
        let err = RetryError::Fatal {
            kind: ErrorKind::Client(404),
            attempts: 1,
            source: RequestError::Http { status: 404, body: Vec::new() },
            message: None,
        }
        .with_message("flow not found; check the flow id");
        assert_eq!(err.message(), Some("flow not found; check the flow id"));
    }
}
