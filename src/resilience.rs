//! Resilience primitives shared by the client engine and the settler:
//! exponential-backoff retry, per-host circuit breaking, and token-bucket
//! rate limiting.

use rand::Rng;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Exponential backoff with jitter, `multiplier=2, jitter=0.1, maxDelay=30s`
/// by default. A retry predicate decides whether a given error is worth
/// retrying at all; structural rejections should return `false` immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.1,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy tuned for the settler: 3 attempts, 2s base delay.
    pub fn settler_default() -> Self {
        Self::default()
    }

    /// Delay before the `attempt`-th retry (0-indexed: 0 = first retry).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = exp.min(self.max_delay.as_secs_f64());
        let jitter_span = capped * self.jitter;
        let jittered = capped + rand::thread_rng().gen_range(-jitter_span..=jitter_span);
        Duration::from_secs_f64(jittered.max(0.0))
    }

    /// Runs `op`, retrying per this policy while `is_retryable` returns
    /// `true` and attempts remain. Returns the last error on exhaustion.
    pub async fn execute<T, E, Fut, Op, Retryable>(
        &self,
        mut op: Op,
        is_retryable: Retryable,
    ) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        Retryable: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt + 1 < self.max_attempts && is_retryable(&err) => {
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-host circuit breaker: closed → open after `failure_threshold`
/// consecutive failures, open → half-open after `reset_timeout`, half-open
/// → closed after `success_threshold` consecutive successes (or back to
/// open on any failure).
pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    reset_timeout: Duration,
    state: Mutex<BreakerInner>,
}

struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, success_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            success_threshold,
            reset_timeout,
            state: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Returns the current state, transitioning open → half-open if the
    /// reset timeout has elapsed.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.state.lock().expect("circuit breaker lock poisoned");
        if inner.state == BreakerState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.reset_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.consecutive_successes = 0;
                }
            }
        }
        inner.state
    }

    /// Returns `true` if a call should be allowed through right now.
    pub fn allow_request(&self) -> bool {
        self.state() != BreakerState::Open
    }

    pub fn record_success(&self) {
        let mut inner = self.state.lock().expect("circuit breaker lock poisoned");
        inner.consecutive_failures = 0;
        match inner.state {
            BreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.opened_at = None;
                }
            }
            BreakerState::Closed => {}
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.state.lock().expect("circuit breaker lock poisoned");
        inner.consecutive_successes = 0;
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
            }
            BreakerState::Open => {}
        }
    }
}

/// Token-bucket rate limiter. Refills continuously at `rate` tokens/second
/// up to `capacity`.
pub struct TokenBucket {
    capacity: f64,
    rate_per_sec: f64,
    tokens: Mutex<(f64, Instant)>,
}

impl TokenBucket {
    pub fn new(capacity: u32, rate_per_sec: u32) -> Self {
        Self {
            capacity: capacity as f64,
            rate_per_sec: rate_per_sec as f64,
            tokens: Mutex::new((capacity as f64, Instant::now())),
        }
    }

    fn refill(&self, guard: &mut (f64, Instant)) {
        let elapsed = guard.1.elapsed().as_secs_f64();
        guard.0 = (guard.0 + elapsed * self.rate_per_sec).min(self.capacity);
        guard.1 = Instant::now();
    }

    /// Attempts to consume one token immediately. Returns `true` on success.
    pub fn try_consume(&self) -> bool {
        self.try_consume_n(1.0)
    }

    fn try_consume_n(&self, n: f64) -> bool {
        let mut guard = self.tokens.lock().expect("token bucket lock poisoned");
        self.refill(&mut guard);
        if guard.0 >= n {
            guard.0 -= n;
            true
        } else {
            false
        }
    }

    /// Waits (polling every 50ms) until a token is available, then consumes it.
    pub async fn wait_and_consume(&self) {
        while !self.try_consume() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_for_respects_max_delay() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.0,
            max_delay: Duration::from_secs(30),
        };
        assert!(policy.delay_for(10).as_secs_f64() <= 30.0);
    }

    #[tokio::test]
    async fn execute_retries_until_success() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            multiplier: 1.0,
            jitter: 0.0,
            max_delay: Duration::from_millis(5),
        };
        let mut attempts = 0;
        let result: Result<i32, &str> = policy
            .execute(
                || {
                    attempts += 1;
                    let current = attempts;
                    async move {
                        if current < 3 {
                            Err("transient")
                        } else {
                            Ok(42)
                        }
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn execute_stops_on_non_retryable_error() {
        let policy = RetryPolicy::default();
        let mut attempts = 0;
        let result: Result<i32, &str> = policy
            .execute(
                || {
                    attempts += 1;
                    async move { Err("fatal") }
                },
                |_| false,
            )
            .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, 1, Duration::from_millis(50));
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn breaker_half_opens_after_timeout_then_closes_on_success() {
        let breaker = CircuitBreaker::new(1, 1, Duration::from_millis(10));
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn token_bucket_denies_when_empty() {
        let bucket = TokenBucket::new(1, 1);
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
    }

    #[tokio::test]
    async fn token_bucket_refills_over_time() {
        let bucket = TokenBucket::new(1, 1000);
        assert!(bucket.try_consume());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(bucket.try_consume());
    }
}
