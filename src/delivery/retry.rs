//! Bounded exponential backoff with server-mandated waits
//!
//! Ordinary faults consume an attempt and sleep `initial * multiplier^n`.
//! `RetryAfter(n)` sleeps exactly n seconds and does not consume an attempt,
//! so a rate-limited send keeps waiting for as long as the server asks.

use super::transport::TransportError;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Delay primitive, swappable so the policy is independent of the runtime
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MULTIPLIER: u32 = 2;

#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: u32,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("multiplier", &self.multiplier)
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_INITIAL_DELAY)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            multiplier: DEFAULT_MULTIPLIER,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff after the `failures`-th ordinary failure (1-based)
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds or ordinary failures exhaust `max_attempts`
    ///
    /// Returns the last ordinary failure on exhaustion.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, TransportError>> + Send,
        T: Send,
    {
        let mut failures = 0u32;
        let mut last_error: Option<TransportError> = None;

        while failures < self.max_attempts {
            match op().await {
                Ok(value) => {
                    if failures > 0 {
                        log::info!("✅ {} succeeded after {} failed attempt(s)", what, failures);
                    }
                    return Ok(value);
                }
                Err(TransportError::RetryAfter(secs)) => {
                    log::warn!("⏳ Server asked to wait {}s before sending {}", secs, what);
                    self.sleeper.sleep(Duration::from_secs(secs)).await;
                }
                Err(err) => {
                    failures += 1;
                    log::error!(
                        "❌ Failed to send {} (attempt {}/{}): {}",
                        what,
                        failures,
                        self.max_attempts,
                        err
                    );
                    if failures < self.max_attempts {
                        let delay = self.delay_after(failures);
                        log::warn!("⏳ Retrying {} in {:?}", what, delay);
                        self.sleeper.sleep(delay).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TransportError::Permanent(format!(
                "{} not sent: retry policy allows {} attempts",
                what, self.max_attempts
            ))
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records requested delays and returns immediately
    #[derive(Default)]
    pub(crate) struct RecordingSleeper {
        pub slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn policy(sleeper: &Arc<RecordingSleeper>) -> RetryPolicy {
        RetryPolicy::default().with_sleeper(sleeper.clone())
    }

    #[test]
    fn test_delay_doubles_from_initial() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(4), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let calls = AtomicUsize::new(0);

        let result = policy(&sleeper)
            .run("message", || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(TransportError::Transient("connection reset".into())),
                    _ => Ok("sent"),
                }
            })
            .await;

        assert_eq!(result, Ok("sent"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let slept = sleeper.slept.lock().unwrap().clone();
        assert_eq!(slept, vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert!(slept.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_last_failure() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = policy(&sleeper)
            .run("photo", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Permanent(format!("bad request #{}", n)))
            })
            .await;

        assert_eq!(result, Err(TransportError::Permanent("bad request #4".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // No sleep after the final attempt
        assert_eq!(
            sleeper.slept.lock().unwrap().clone(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_after_waits_exactly_and_is_not_counted() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let calls = AtomicUsize::new(0);

        // Ten rate limits in a row would exhaust five attempts if they counted
        let result = policy(&sleeper)
            .run("document", || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0..=9 => Err(TransportError::RetryAfter(3)),
                    10 => Err(TransportError::Transient("timeout".into())),
                    _ => Ok(()),
                }
            })
            .await;

        assert_eq!(result, Ok(()));
        let slept = sleeper.slept.lock().unwrap().clone();
        assert_eq!(slept.len(), 11);
        assert!(slept[..10].iter().all(|d| *d == Duration::from_secs(3)));
        // Backoff schedule starts fresh: rate-limit waits did not advance it
        assert_eq!(slept[10], Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_attempts_never_calls() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = RetryPolicy::new(0, Duration::from_secs(1))
            .run("message", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(TransportError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
