//! Backoff computation: exponential growth with multiplicative jitter.

use std::time::Duration;

use rand::Rng;

use super::classify::ErrorKind;
use super::policy::RetryPolicy;

/// Deterministic part of the wait: `retry_interval * multiplier^attempt`,
/// doubled for rate-limit errors so throttling services get more recovery
/// time. `attempt` is 0-based and names the wait before the *second* overall
/// try; there is no wait before the first.
///
/// Growth is deliberately uncapped: `max_retries` is the only brake, so a
/// large budget combined with a large multiplier yields very long waits.
pub fn base_wait_for(attempt: u32, kind: ErrorKind, policy: &RetryPolicy) -> Duration {
    let mut secs =
        policy.retry_interval.as_secs_f64() * policy.backoff_multiplier.powi(attempt as i32);
    if kind == ErrorKind::RateLimit {
        secs *= 2.0;
    }
    duration_from_secs(secs)
}

/// Full wait for one retry: the deterministic base multiplied by a uniform
/// draw from `[1 - jitter_fraction, 1 + jitter_fraction]`. Fresh randomness
/// per call so concurrent callers do not retry in lockstep.
pub fn wait_for(attempt: u32, kind: ErrorKind, policy: &RetryPolicy) -> Duration {
    let base = base_wait_for(attempt, kind, policy);
    let jitter = policy.jitter_fraction.clamp(0.0, 1.0);
    if jitter == 0.0 {
        return base;
    }
    let factor = rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter);
    duration_from_secs(base.as_secs_f64() * factor)
}

/// `Duration::from_secs_f64` panics on non-finite or overflowing input;
/// saturate instead so an extreme policy degrades to a huge wait, not a panic.
fn duration_from_secs(secs: f64) -> Duration {
    if !secs.is_finite() || secs >= Duration::MAX.as_secs_f64() {
        return Duration::MAX;
    }
    Duration::from_secs_f64(secs.max(0.0))
}
