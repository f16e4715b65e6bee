//! Fetch-with-retry execution over a fixed backoff schedule.
//!
//! The executor knows nothing about HTTP or manifests: it runs any fallible
//! async operation, sleeping between attempts for exactly the delays listed
//! in its [`BackoffSchedule`]. The same executor backs both the manifest
//! fetch and every per-artifact download.
//!
//! # Example
//!
//! ```ignore
//! use manifest_fetch::retry::{BackoffSchedule, RetryingExecutor};
//!
//! let executor = RetryingExecutor::new(BackoffSchedule::default());
//! let body = executor.execute(|| async { client.get(url).await }).await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// =============================================================================
// Backoff Schedule
// =============================================================================

/// Default delays between attempts: 1s, 3s, then 10s.
pub const DEFAULT_BACKOFF_SECS: [u64; 3] = [1, 3, 10];

/// Ordered delays applied between retry attempts.
///
/// Index 0 is the delay after the first failure, index 1 after the second,
/// and so on. Once the schedule is exhausted the operation is considered
/// failed, so an operation is attempted at most `len() + 1` times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffSchedule(Vec<Duration>);

impl BackoffSchedule {
    /// Creates a schedule from explicit delays.
    ///
    /// Returns `None` if `delays` is empty.
    pub fn new(delays: Vec<Duration>) -> Option<Self> {
        if delays.is_empty() {
            None
        } else {
            Some(Self(delays))
        }
    }

    /// Creates a schedule from whole seconds.
    pub fn from_secs(secs: &[u64]) -> Option<Self> {
        Self::new(secs.iter().copied().map(Duration::from_secs).collect())
    }

    /// Delay to wait after the failure of attempt `attempt` (0-based).
    ///
    /// Returns `None` when no more retries are allowed.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        self.0.get(attempt).copied()
    }

    /// Maximum number of attempts, including the initial one.
    pub fn max_attempts(&self) -> usize {
        self.0.len() + 1
    }

    /// Sum of every delay in the schedule.
    pub fn total_delay(&self) -> Duration {
        self.0.iter().sum()
    }

    /// The configured delays.
    pub fn delays(&self) -> &[Duration] {
        &self.0
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self(DEFAULT_BACKOFF_SECS.iter().copied().map(Duration::from_secs).collect())
    }
}

// =============================================================================
// Sleeping
// =============================================================================

/// Source of the wall-clock wait between attempts.
///
/// Production code uses [`TokioSleeper`]; tests substitute a sleeper that
/// records the requested delays and returns immediately.
pub trait Sleeper: Send + Sync {
    /// Returns a future that completes after `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Marker returned when cancellation is observed before any attempt ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

// =============================================================================
// Executor
// =============================================================================

/// Runs fallible operations up to `schedule.max_attempts()` times.
#[derive(Clone)]
pub struct RetryingExecutor {
    schedule: BackoffSchedule,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingExecutor")
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

impl Default for RetryingExecutor {
    fn default() -> Self {
        Self::new(BackoffSchedule::default())
    }
}

impl RetryingExecutor {
    /// Creates an executor that sleeps with tokio.
    pub fn new(schedule: BackoffSchedule) -> Self {
        Self::with_sleeper(schedule, Arc::new(TokioSleeper))
    }

    /// Creates an executor with a custom sleeper.
    pub fn with_sleeper(schedule: BackoffSchedule, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { schedule, sleeper }
    }

    /// The backoff schedule in use.
    pub fn schedule(&self) -> &BackoffSchedule {
        &self.schedule
    }

    /// Runs `operation` until it succeeds or the schedule is exhausted.
    ///
    /// The returned error is exactly the last attempt's error.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => match self.schedule.delay_for_attempt(attempt) {
                    Some(delay) => {
                        debug!(attempt = attempt + 1, ?delay, error = %err, "Attempt failed, retrying");
                        self.sleeper.sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    /// Like [`execute`](Self::execute), but stops early once `token` is cancelled.
    ///
    /// The token is checked before every attempt and raced against every
    /// backoff sleep. An attempt already in flight is allowed to finish.
    /// If cancellation is seen after a failure, that failure is returned;
    /// if it is seen before the first attempt, `E::from(Cancelled)` is.
    pub async fn execute_cancellable<T, E, F, Fut>(
        &self,
        token: &CancellationToken,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display + From<Cancelled>,
    {
        if token.is_cancelled() {
            return Err(E::from(Cancelled));
        }

        let mut attempt = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let Some(delay) = self.schedule.delay_for_attempt(attempt) else {
                return Err(err);
            };
            if token.is_cancelled() {
                return Err(err);
            }

            debug!(attempt = attempt + 1, ?delay, error = %err, "Attempt failed, retrying");
            tokio::select! {
                _ = self.sleeper.sleep(delay) => {}
                _ = token.cancelled() => return Err(err),
            }
            if token.is_cancelled() {
                return Err(err);
            }
            attempt += 1;
        }
    }
}
