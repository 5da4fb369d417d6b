//! HTTP client for the flowd API with transparent retries.
//!
//! Every verb method routes through one `perform` path that wraps a single
//! curl transfer in the retry loop, so callers get backoff-with-jitter retry
//! behavior with no per-call opt-in. Each attempt uses a fresh `Easy` handle;
//! a handle left mid-transfer by a failed attempt is never reused.

mod response;

pub use response::Response;

use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::retry::{
    run_with_retry, CallOverrides, ConfigSource, EnvSource, PolicyOverrides, RequestError,
    RetryError, RetryPolicy,
};

/// HTTP verbs supported by the flowd API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// Client for the flowd orchestration API. The retry policy is resolved once
/// at construction and shared, read-only, by every call made through the
/// client.
#[derive(Debug, Clone)]
pub struct FlowdClient {
    base_url: Url,
    policy: RetryPolicy,
    default_headers: HashMap<String, String>,
}

impl FlowdClient {
    /// Build a client, resolving the retry policy from `overrides` over the
    /// process environment (see the `KEY_*` names in the retry module).
    pub fn new(base_url: &str, overrides: PolicyOverrides) -> anyhow::Result<Self> {
        Self::with_config_source(base_url, overrides, &EnvSource::new())
    }

    /// Like [`FlowdClient::new`] but with an injected named-configuration
    /// source (a loaded config file, a test map).
    pub fn with_config_source(
        base_url: &str,
        overrides: PolicyOverrides,
        source: &dyn ConfigSource,
    ) -> anyhow::Result<Self> {
        let policy = RetryPolicy::resolve(&overrides, source);
        Self::with_policy(base_url, policy)
    }

    /// Build a client around an already-resolved policy (direct injection,
    /// no environment reads).
    pub fn with_policy(base_url: &str, policy: RetryPolicy) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        Ok(Self { base_url, policy, default_headers: HashMap::new() })
    }

    /// Header sent with every request (e.g. an auth token).
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// The policy this client resolved at construction.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn get(&self, path: &str) -> Result<Response, RetryError> {
        self.request(Method::Get, path, None)
    }

    pub fn delete(&self, path: &str) -> Result<Response, RetryError> {
        self.request(Method::Delete, path, None)
    }

    /// POST `body` as JSON.
    pub fn post<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<Response, RetryError> {
        let label = format!("POST {}", path);
        let payload = match serde_json::to_vec(body) {
            Ok(p) => p,
            // A body that cannot be serialized is a caller bug; it goes
            // through the classifier (as Other) so the failure semantics
            // match every other terminal error.
            Err(e) => {
                return Err(self.fatal_without_attempt(&label, RequestError::Body(e)));
            }
        };
        self.request(Method::Post, path, Some(&payload))
    }

    /// Raw request entry point with the default (client-wide) policy.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<Response, RetryError> {
        self.request_with(method, path, body, &CallOverrides::default())
    }

    /// Raw request entry point with per-call overrides (`max_retries`,
    /// `retry_interval`, and an optional display message attached to the
    /// terminal error).
    pub fn request_with(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
        call: &CallOverrides,
    ) -> Result<Response, RetryError> {
        let policy = self.policy.with_call_overrides(call);
        let label = format!("{} {}", method.as_str(), path);

        let url = match self.base_url.join(path) {
            Ok(u) => u,
            Err(e) => {
                let err = self.fatal_without_attempt(&label, RequestError::InvalidUrl(e));
                return Err(attach_message(err, call));
            }
        };

        let result = run_with_retry(&policy, &label, || {
            self.perform_once(method, &url, body, policy.timeout)
        });
        result.map_err(|e| attach_message(e, call))
    }

    /// One transfer on a fresh Easy handle. Non-2xx statuses become
    /// `RequestError::Http` so the classifier sees them as data.
    fn perform_once(
        &self,
        method: Method,
        url: &Url,
        body: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<Response, RequestError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str()).map_err(RequestError::Curl)?;
        easy.follow_location(true).map_err(RequestError::Curl)?;
        easy.connect_timeout(Duration::from_secs(15))
            .map_err(RequestError::Curl)?;
        easy.timeout(timeout).map_err(RequestError::Curl)?;

        match method {
            Method::Get => easy.get(true).map_err(RequestError::Curl)?,
            Method::Post => easy.post(true).map_err(RequestError::Curl)?,
            Method::Delete => easy.custom_request("DELETE").map_err(RequestError::Curl)?,
        }
        if let Some(payload) = body {
            easy.post_fields_copy(payload).map_err(RequestError::Curl)?;
        }

        let mut list = curl::easy::List::new();
        for (k, v) in &self.default_headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))
                .map_err(RequestError::Curl)?;
        }
        if body.is_some() {
            list.append("Content-Type: application/json")
                .map_err(RequestError::Curl)?;
        }
        if !self.default_headers.is_empty() || body.is_some() {
            easy.http_headers(list).map_err(RequestError::Curl)?;
        }

        let mut resp_body = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    resp_body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(RequestError::Curl)?;
            transfer.perform().map_err(RequestError::Curl)?;
        }

        let status = easy.response_code().map_err(RequestError::Curl)? as u32;
        if !(200..300).contains(&status) {
            return Err(RequestError::Http { status, body: resp_body });
        }
        Ok(Response { status, body: resp_body })
    }

    /// Terminal error for failures that happen before any attempt runs
    /// (unjoinable path, unserializable body). Logged like any other
    /// non-retryable failure.
    fn fatal_without_attempt(&self, label: &str, err: RequestError) -> RetryError {
        tracing::error!("{}: request could not be built: {}", label, err);
        RetryError::Fatal {
            kind: crate::retry::classify(&err),
            attempts: 0,
            source: err,
            message: None,
        }
    }
}

fn attach_message(err: RetryError, call: &CallOverrides) -> RetryError {
    match &call.error_message {
        Some(msg) => err.with_message(msg.clone()),
        None => err,
    }
}
