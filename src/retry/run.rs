//! Retry loop: run a closure until success, a non-retryable failure, or an
//! exhausted attempt budget.

use std::time::Duration;

use super::backoff::wait_for;
use super::classify::classify;
use super::error::{RequestError, RetryError};
use super::policy::RetryPolicy;

/// Per-invocation bookkeeping; exists only for the duration of one
/// `run_with_retry` call and never escapes it.
struct AttemptContext<'a> {
    label: &'a str,
    attempt: u32,
    total_wait: Duration,
}

/// Runs `op` until it succeeds or the policy says to stop, sleeping the
/// backoff duration between attempts with `std::thread::sleep`.
///
/// `label` names the operation in log records (e.g. `"GET /flows"`). On a
/// non-retryable classification the original error is returned immediately;
/// on exhaustion the error from the last attempt is returned. Either way the
/// cause stays inspectable through [`RetryError::request_error`].
pub fn run_with_retry<T, F>(policy: &RetryPolicy, label: &str, op: F) -> Result<T, RetryError>
where
    F: FnMut() -> Result<T, RequestError>,
{
    run_with_retry_using(policy, label, std::thread::sleep, op)
}

/// Like [`run_with_retry`] but generic over the sleep function, so tests can
/// record waits instead of blocking.
pub fn run_with_retry_using<T, F, S>(
    policy: &RetryPolicy,
    label: &str,
    mut sleep: S,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Result<T, RequestError>,
    S: FnMut(Duration),
{
    let mut ctx = AttemptContext { label, attempt: 0, total_wait: Duration::ZERO };
    loop {
        match op() {
            Ok(value) => {
                if ctx.attempt > 0 {
                    tracing::info!(
                        "{}: retry succeeded after {} retries ({:.2}s total wait)",
                        ctx.label,
                        ctx.attempt,
                        ctx.total_wait.as_secs_f64()
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                let kind = classify(&err);
                if !kind.is_retryable() {
                    tracing::error!(
                        "{}: non-retryable error on attempt {}: {}",
                        ctx.label,
                        ctx.attempt + 1,
                        err
                    );
                    return Err(RetryError::Fatal {
                        kind,
                        attempts: ctx.attempt + 1,
                        source: err,
                        message: None,
                    });
                }
                if ctx.attempt >= policy.max_retries {
                    tracing::error!(
                        "{}: max retries exceeded after {} attempts ({:.2}s total wait): {}",
                        ctx.label,
                        ctx.attempt + 1,
                        ctx.total_wait.as_secs_f64(),
                        err
                    );
                    return Err(RetryError::Exhausted {
                        kind,
                        attempts: ctx.attempt + 1,
                        source: err,
                        message: None,
                    });
                }
                let wait = wait_for(ctx.attempt, kind, policy);
                tracing::warn!(
                    "{}: attempt {} failed ({}); retrying in {:.2}s",
                    ctx.label,
                    ctx.attempt + 1,
                    err,
                    wait.as_secs_f64()
                );
                sleep(wait);
                ctx.total_wait += wait;
                ctx.attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::classify::ErrorKind;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_interval: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.0,
            timeout: Duration::from_secs(5),
        }
    }

    fn http(status: u32) -> RequestError {
        RequestError::Http { status, body: Vec::new() }
    }

    /// Operation failing `fail_times` with `status` before returning Ok.
    fn flaky(status: u32, fail_times: u32) -> impl FnMut() -> Result<u32, RequestError> {
        let mut calls = 0;
        move || {
            calls += 1;
            if calls <= fail_times {
                Err(http(status))
            } else {
                Ok(calls)
            }
        }
    }

    #[test]
    fn succeeds_after_transient_failures() {
        for n in 0..=3u32 {
            let mut sleeps = Vec::new();
            let result = run_with_retry_using(
                &policy(3),
                "op",
                |d| sleeps.push(d),
                flaky(500, n),
            );
            assert_eq!(result.unwrap(), n + 1);
            assert_eq!(sleeps.len(), n as usize);
        }
    }

    #[test]
    fn fails_when_budget_smaller_than_failures() {
        for n in 4..=5u32 {
            let mut sleeps = Vec::new();
            let result =
                run_with_retry_using(&policy(3), "op", |d| sleeps.push(d), flaky(500, n));
            let err = result.unwrap_err();
            assert!(matches!(err, RetryError::Exhausted { .. }));
            assert_eq!(err.attempts(), 4); // 1 initial + 3 retries
            assert_eq!(err.request_error().status(), Some(500));
            assert_eq!(sleeps.len(), 3);
        }
    }

    #[test]
    fn non_retryable_invoked_exactly_once_with_zero_wait() {
        let mut calls = 0u32;
        let mut sleeps = Vec::new();
        let result: Result<(), _> = run_with_retry_using(
            &policy(5),
            "op",
            |d| sleeps.push(d),
            || {
                calls += 1;
                Err(http(404))
            },
        );
        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Fatal { .. }));
        assert_eq!(err.kind(), ErrorKind::Client(404));
        assert_eq!(err.attempts(), 1);
        assert_eq!(calls, 1);
        assert!(sleeps.is_empty());
    }

    #[test]
    fn zero_max_retries_means_one_attempt_and_no_sleep() {
        let mut calls = 0u32;
        let mut sleeps = Vec::new();
        let result: Result<(), _> = run_with_retry_using(
            &policy(0),
            "op",
            |d| sleeps.push(d),
            || {
                calls += 1;
                Err(http(503))
            },
        );
        assert!(matches!(result.unwrap_err(), RetryError::Exhausted { .. }));
        assert_eq!(calls, 1);
        assert!(sleeps.is_empty());
    }

    #[test]
    fn waits_follow_exponential_schedule() {
        let mut sleeps = Vec::new();
        let _ = run_with_retry_using(
            &policy(3),
            "op",
            |d| sleeps.push(d),
            flaky(500, 2),
        );
        assert_eq!(
            sleeps,
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn classification_can_turn_fatal_mid_loop() {
        // 503 then 404: one retry, then immediate stop on the client error.
        let mut calls = 0u32;
        let mut sleeps = Vec::new();
        let result: Result<(), _> = run_with_retry_using(
            &policy(5),
            "op",
            |d| sleeps.push(d),
            || {
                calls += 1;
                if calls == 1 {
                    Err(http(503))
                } else {
                    Err(http(404))
                }
            },
        );
        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Fatal { .. }));
        assert_eq!(err.attempts(), 2);
        assert_eq!(sleeps.len(), 1);
    }

    #[test]
    fn timed_out_attempt_is_retried_as_network_failure() {
        // CURLE_OPERATION_TIMEDOUT: a fired per-attempt timeout re-enters the
        // retry decision like any other transient transport error.
        let mut calls = 0u32;
        let mut sleeps = Vec::new();
        let result = run_with_retry_using(
            &policy(3),
            "op",
            |d| sleeps.push(d),
            || {
                calls += 1;
                if calls == 1 {
                    Err(RequestError::Curl(curl::Error::new(28)))
                } else {
                    Ok(calls)
                }
            },
        );
        assert_eq!(result.unwrap(), 2);
        assert_eq!(sleeps.len(), 1);
    }

    #[test]
    fn success_log_reports_retry_count() {
        use std::io;
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::fmt::MakeWriter;

        #[derive(Clone)]
        struct Buf(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Buf {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        impl<'a> MakeWriter<'a> for Buf {
            type Writer = Buf;

            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        let buf = Buf(Arc::new(Mutex::new(Vec::new())));
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buf.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let mut sleeps = Vec::new();
            let result =
                run_with_retry_using(&policy(3), "op", |d| sleeps.push(d), flaky(500, 2));
            assert!(result.is_ok());
        });
        let logs = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        // two failures before success = 2 retries, not "attempt 3"
        assert!(
            logs.contains("retry succeeded after 2 retries"),
            "unexpected log output: {}",
            logs
        );
    }

    #[test]
    fn rate_limit_waits_double_the_server_waits() {
        let mut server_sleeps = Vec::new();
        let _ = run_with_retry_using(
            &policy(2),
            "op",
            |d| server_sleeps.push(d),
            flaky(500, 5),
        );
        let mut limited_sleeps = Vec::new();
        let _ = run_with_retry_using(
            &policy(2),
            "op",
            |d| limited_sleeps.push(d),
            flaky(429, 5),
        );
        assert_eq!(server_sleeps.len(), limited_sleeps.len());
        for (s, l) in server_sleeps.iter().zip(&limited_sleeps) {
            assert_eq!(*l, *s * 2);
        }
    }
}
