use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Named-configuration keys consumed by [`RetryPolicy::resolve`].
pub const KEY_MAX_RETRIES: &str = "MAX_RETRIES";
pub const KEY_RETRY_INTERVAL: &str = "RETRY_INTERVAL";
pub const KEY_BACKOFF_MULTIPLIER: &str = "BACKOFF_MULTIPLIER";
pub const KEY_JITTER_PERCENTAGE: &str = "JITTER_PERCENTAGE";
pub const KEY_TIMEOUT: &str = "TIMEOUT";

/// Lookup of named configuration values (the middle precedence tier).
///
/// Implemented by [`EnvSource`] for process environment variables, by the
/// `[retry]` table of `config.toml` (see `config::FileSource`), and by
/// `HashMap<String, String>` for tests. The resolver only ever reads the
/// five `KEY_*` names above.
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads named values from process environment variables, optionally behind
/// a prefix (e.g. `FLOWD_MAX_RETRIES` with prefix `"FLOWD_"`).
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    prefix: Option<String>,
}

impl EnvSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        let name = match &self.prefix {
            Some(p) => format!("{}{}", p, key),
            None => key.to_string(),
        };
        std::env::var(name).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Resolved retry policy. Immutable after [`RetryPolicy::resolve`]; shared
/// read-only by every call made through a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retry attempts after the initial try (0 disables retrying).
    pub max_retries: u32,
    /// Base wait before the first retry.
    pub retry_interval: Duration,
    /// Exponential growth factor per attempt.
    pub backoff_multiplier: f64,
    /// Symmetric randomization fraction in [0, 1] applied to each wait.
    pub jitter_fraction: f64,
    /// Per-attempt deadline for the wrapped operation (not a total budget).
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_interval: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.2,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Explicit per-client overrides (highest precedence tier). Any field left
/// `None` falls through to the named-configuration source, then the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyOverrides {
    pub max_retries: Option<u32>,
    pub retry_interval: Option<Duration>,
    pub backoff_multiplier: Option<f64>,
    pub jitter_fraction: Option<f64>,
    pub timeout: Option<Duration>,
}

/// Per-call override surface: a narrower version of [`PolicyOverrides`] plus
/// an optional user-facing message attached to the terminal error for
/// display. The message is pass-through data, never interpreted.
#[derive(Debug, Clone, Default)]
pub struct CallOverrides {
    pub max_retries: Option<u32>,
    pub retry_interval: Option<Duration>,
    pub error_message: Option<String>,
}

/// Resolve one field: explicit override, then named source, then default.
/// Invalid values at any tier are logged and skipped; resolution never fails.
fn resolve_field<T>(
    key: &str,
    explicit: Option<T>,
    source: &dyn ConfigSource,
    default: T,
    valid: &dyn Fn(&T) -> bool,
) -> T
where
    T: Copy + fmt::Display + FromStr,
{
    if let Some(v) = explicit {
        if valid(&v) {
            return v;
        }
        tracing::warn!("explicit {} = {} is out of range; ignoring it", key, v);
    }
    if let Some(raw) = source.get(key) {
        match raw.trim().parse::<T>() {
            Ok(v) if valid(&v) => return v,
            _ => tracing::warn!(
                "invalid {} value {:?} in configuration; using default",
                key,
                raw
            ),
        }
    }
    default
}

/// Like [`resolve_field`] but for the two wait fields: the explicit tier is
/// taken as a native `Duration` (sub-second values survive), while the named
/// tier parses a whole number of `from_raw` units (ms or s).
fn resolve_duration(
    key: &str,
    explicit: Option<Duration>,
    source: &dyn ConfigSource,
    default: Duration,
    from_raw: &dyn Fn(u64) -> Duration,
) -> Duration {
    if let Some(v) = explicit {
        if v > Duration::ZERO {
            return v;
        }
        tracing::warn!("explicit {} of zero is out of range; ignoring it", key);
    }
    if let Some(raw) = source.get(key) {
        match raw.trim().parse::<u64>() {
            Ok(v) if v > 0 => return from_raw(v),
            _ => tracing::warn!(
                "invalid {} value {:?} in configuration; using default",
                key,
                raw
            ),
        }
    }
    default
}

impl RetryPolicy {
    /// Merge explicit overrides, named configuration and hardcoded defaults
    /// into a complete policy. Each field is resolved independently, so a
    /// partial override does not suppress named values for the other fields.
    pub fn resolve(overrides: &PolicyOverrides, source: &dyn ConfigSource) -> Self {
        let d = RetryPolicy::default();
        let max_retries = resolve_field(
            KEY_MAX_RETRIES,
            overrides.max_retries,
            source,
            d.max_retries,
            &|_| true,
        );
        let retry_interval = resolve_duration(
            KEY_RETRY_INTERVAL,
            overrides.retry_interval,
            source,
            d.retry_interval,
            &Duration::from_millis,
        );
        let backoff_multiplier = resolve_field(
            KEY_BACKOFF_MULTIPLIER,
            overrides.backoff_multiplier,
            source,
            d.backoff_multiplier,
            &|v: &f64| v.is_finite() && *v > 0.0,
        );
        let jitter_fraction = resolve_field(
            KEY_JITTER_PERCENTAGE,
            overrides.jitter_fraction,
            source,
            d.jitter_fraction,
            &|v: &f64| v.is_finite() && (0.0..=1.0).contains(v),
        );
        let timeout = resolve_duration(
            KEY_TIMEOUT,
            overrides.timeout,
            source,
            d.timeout,
            &Duration::from_secs,
        );
        RetryPolicy {
            max_retries,
            retry_interval,
            backoff_multiplier,
            jitter_fraction,
            timeout,
        }
    }

    /// Narrow a resolved policy for one call. Invalid per-call values are
    /// logged and ignored, same as during resolution.
    pub fn with_call_overrides(&self, call: &CallOverrides) -> Self {
        let mut p = *self;
        if let Some(n) = call.max_retries {
            p.max_retries = n;
        }
        if let Some(iv) = call.retry_interval {
            if iv > Duration::ZERO {
                p.retry_interval = iv;
            } else {
                tracing::warn!("per-call retry interval of 0 ignored; keeping {:?}", p.retry_interval);
            }
        }
        p
    }
}
