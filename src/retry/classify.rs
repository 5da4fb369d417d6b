//! Classify HTTP statuses and curl errors into retry error kinds.

use super::error::RequestError;

/// High-level classification of a failed attempt for retry purposes.
///
/// Only `Network`, `Server` and `RateLimit` are worth re-attempting; client
/// errors and anything of unknown shape fail fast so bugs are not masked by
/// pointless retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network-level failure (connection refused/reset, DNS, timeout before
    /// any response).
    Network,
    /// Retryable server-side HTTP status (5xx).
    Server(u16),
    /// Server asked us to slow down (429); backed off twice as hard.
    RateLimit,
    /// Non-retryable HTTP status (4xx other than 429).
    Client(u16),
    /// Any error that matches no known shape. Treated as non-retryable.
    Other,
}

impl ErrorKind {
    /// True if re-attempting the operation has a reasonable chance of success.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Server(_) | ErrorKind::RateLimit
        )
    }
}

/// Classify an HTTP status code for retry decisions.
///
/// 429 is separated from the other 5xx-style overload signals because
/// rate-limited services get a doubled backoff base. A 2xx/3xx landing here
/// means the caller classified a success; mapped to `Client` (non-retryable)
/// rather than panicking.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 => ErrorKind::RateLimit,
        500..=599 => ErrorKind::Server(code as u16),
        400..=499 => ErrorKind::Client(code as u16),
        _ => ErrorKind::Client(code as u16),
    }
}

/// Classify a curl error for retry decisions.
///
/// A per-attempt timeout fires as `is_operation_timedout` and is treated as a
/// network failure, so it re-enters the same retry decision as any other
/// transient transport error.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Network;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return ErrorKind::Network;
    }
    ErrorKind::Other
}

/// Classify a request error (curl or HTTP) into an [`ErrorKind`].
/// Pure function of the outcome; no policy knowledge, no side effects.
pub fn classify(e: &RequestError) -> ErrorKind {
    match e {
        RequestError::Curl(ce) => classify_curl_error(ce),
        RequestError::Http { status, .. } => classify_http_status(*status),
        RequestError::InvalidUrl(_) | RequestError::Body(_) => ErrorKind::Other,
    }
}
