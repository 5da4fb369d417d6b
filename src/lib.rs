//! flowd-client: resilient HTTP client for the flowd orchestration API.
//!
//! The retry module is the core: policy resolution (explicit > named
//! configuration > defaults), failure classification, exponential backoff
//! with jitter, and the retry loop. The client module applies it to every
//! outbound call so callers never opt in per request.

pub mod client;
pub mod config;
pub mod logging;
pub mod retry;

pub use client::{FlowdClient, Method, Response};
pub use retry::{CallOverrides, ErrorKind, PolicyOverrides, RequestError, RetryError, RetryPolicy};
