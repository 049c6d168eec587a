//! Bounded retry for upstream HTTP calls.
//!
//! A `429` waits for the server's `Retry-After` (or a fallback) and tries
//! again. Any other failure waits `backoff_step * attempt`. After
//! `max_attempts` the last status and detail are reported as
//! [`MetadataError::Exhausted`].

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::MetadataError;

/// The parts of an HTTP response the retry loop cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    /// Parsed `Retry-After` header, in seconds.
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// How many times to try and how long to wait between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    ///
    /// Default: 3
    pub max_attempts: u32,

    /// Wait after a `429` that carries no `Retry-After`.
    ///
    /// Default: 1 second
    pub rate_limit_fallback: Duration,

    /// Multiplied by the attempt number after any other failure.
    ///
    /// Default: 1 second
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_fallback: Duration::from_secs(1),
            backoff_step: Duration::from_secs(1),
        }
    }
}

const RATE_LIMITED: u16 = 429;

/// Runs `send` until it yields a success reply or attempts run out.
///
/// `label` names the request in logs. A transport error from `send`
/// counts as a failed attempt like a non-success status.
pub async fn fetch_with_retry<F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut send: F,
) -> Result<HttpReply, MetadataError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<HttpReply, MetadataError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_status = None;
    let mut last_detail = String::from("no attempt made");

    for attempt in 1..=attempts {
        match send().await {
            Ok(reply) if reply.is_success() => return Ok(reply),
            Ok(reply) if reply.status == RATE_LIMITED => {
                let wait = reply.retry_after.unwrap_or(policy.rate_limit_fallback);
                debug!(label, attempt, ?wait, "rate limited");
                last_status = Some(reply.status);
                last_detail = format!("HTTP {}", reply.status);
                if attempt < attempts {
                    tokio::time::sleep(wait).await;
                }
                continue;
            }
            Ok(reply) => {
                warn!(label, attempt, status = reply.status, "upstream request failed");
                last_status = Some(reply.status);
                last_detail = format!(
                    "HTTP {}: {}",
                    reply.status,
                    String::from_utf8_lossy(&reply.body)
                );
            }
            Err(e) => {
                warn!(label, attempt, error = %e, "upstream request failed");
                last_detail = e.to_string();
            }
        }

        if attempt < attempts {
            tokio::time::sleep(policy.backoff_step * attempt).await;
        }
    }

    Err(MetadataError::Exhausted {
        attempts,
        status: last_status,
        detail: last_detail,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;

    /// Paused time advances to timer deadlines on a millisecond grid.
    fn assert_waited(started: Instant, expected: Duration) {
        let waited = started.elapsed();
        assert!(
            waited >= expected && waited < expected + Duration::from_millis(10),
            "waited {waited:?}, expected {expected:?}"
        );
    }

    fn reply(status: u16) -> HttpReply {
        HttpReply {
            status,
            retry_after: None,
            body: Vec::new(),
        }
    }

    /// Hands out scripted outcomes in order.
    struct Script(Mutex<VecDeque<Result<HttpReply, MetadataError>>>);

    impl Script {
        fn new(outcomes: Vec<Result<HttpReply, MetadataError>>) -> Self {
            Self(Mutex::new(outcomes.into()))
        }

        async fn next(&self) -> Result<HttpReply, MetadataError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .expect("script ran out of outcomes")
        }

        fn remaining(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_with_retry_first_success_returns_immediately() {
        let script = Script::new(vec![Ok(reply(200))]);
        let started = Instant::now();

        let result = fetch_with_retry(&RetryPolicy::default(), "t", || script.next()).await;

        assert_eq!(result.unwrap().status, 200);
        assert_waited(started, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_with_retry_honours_retry_after() {
        let limited = HttpReply {
            retry_after: Some(Duration::from_secs(2)),
            ..reply(429)
        };
        let script = Script::new(vec![Ok(limited), Ok(reply(200))]);
        let started = Instant::now();

        let result = fetch_with_retry(&RetryPolicy::default(), "t", || script.next()).await;

        assert!(result.is_ok());
        assert_waited(started, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_with_retry_429_without_header_uses_fallback() {
        let script = Script::new(vec![Ok(reply(429)), Ok(reply(200))]);
        let started = Instant::now();

        fetch_with_retry(&RetryPolicy::default(), "t", || script.next())
            .await
            .unwrap();

        assert_waited(started, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_with_retry_backs_off_linearly() {
        let script = Script::new(vec![Ok(reply(500)), Ok(reply(502)), Ok(reply(200))]);
        let started = Instant::now();

        fetch_with_retry(&RetryPolicy::default(), "t", || script.next())
            .await
            .unwrap();

        // 1s after the first failure, 2s after the second.
        assert_waited(started, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_with_retry_exhaustion_reports_last_status() {
        let script = Script::new(vec![
            Ok(reply(500)),
            Err(MetadataError::Transport("connection reset".into())),
            Ok(HttpReply {
                body: b"unavailable".to_vec(),
                ..reply(503)
            }),
            Ok(reply(200)),
        ]);

        let err = fetch_with_retry(&RetryPolicy::default(), "t", || script.next())
            .await
            .unwrap_err();

        match err {
            MetadataError::Exhausted {
                attempts,
                status,
                detail,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(status, Some(503));
                assert!(detail.contains("unavailable"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(script.remaining(), 1, "no fourth attempt");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_with_retry_no_sleep_after_final_attempt() {
        let script = Script::new(vec![Ok(reply(500)), Ok(reply(500)), Ok(reply(500))]);
        let started = Instant::now();

        let _ = fetch_with_retry(&RetryPolicy::default(), "t", || script.next()).await;

        assert_waited(started, Duration::from_secs(3));
    }
}
