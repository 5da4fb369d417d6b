//! Retry policy engine.
//!
//! Encapsulates configuration resolution (explicit > named configuration >
//! defaults), error classification (network, 5xx, 429 vs terminal 4xx),
//! exponential backoff with jitter, and the retry loop itself, so the HTTP
//! client layer gets one consistent resilience policy.

mod backoff;
mod classify;
mod error;
mod policy;
mod run;

pub use backoff::{base_wait_for, wait_for};
pub use classify::{classify, classify_curl_error, classify_http_status, ErrorKind};
pub use error::{RequestError, RetryError};
pub use policy::{
    CallOverrides, ConfigSource, EnvSource, PolicyOverrides, RetryPolicy,
    KEY_BACKOFF_MULTIPLIER, KEY_JITTER_PERCENTAGE, KEY_MAX_RETRIES, KEY_RETRY_INTERVAL,
    KEY_TIMEOUT,
};
pub use run::{run_with_retry, run_with_retry_using};
