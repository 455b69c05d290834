use core::future::Future;
use core::time::Duration;

use retry::delay::Fibonacci;
use tracing::{error, warn};

use crate::error::Error;

// Default parameters for the retrying mechanism
pub const MAX_RETRIES: usize = 5;
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(400);

#[derive(Copy, Clone, Debug)]
pub struct ConstantGrowth {
    delay: Duration,
    incr: Duration,
}

impl ConstantGrowth {
    pub const fn new(delay: Duration, incr: Duration) -> Self {
        Self { delay, incr }
    }

    pub const fn clamp(self, max_delay: Duration, max_retries: usize) -> Clamped<Self> {
        Clamped::new(self, max_delay, max_retries)
    }
}

impl From<Duration> for ConstantGrowth {
    fn from(delay: Duration) -> Self {
        Self::new(delay, Duration::from_secs(1))
    }
}

impl Iterator for ConstantGrowth {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.delay;

        if let Some(next) = self.delay.checked_add(self.incr) {
            self.delay = next;
        }

        Some(delay)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Clamped<S> {
    pub strategy: S,
    pub max_delay: Duration,
    pub max_retries: usize,
}

impl Default for Clamped<Fibonacci> {
    fn default() -> Self {
        Self::new(
            Fibonacci::from(INITIAL_RETRY_DELAY),
            MAX_RETRY_DELAY,
            MAX_RETRIES,
        )
    }
}

impl<S> Clamped<S> {
    pub const fn new(strategy: S, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            strategy,
            max_delay,
            max_retries,
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Duration>
    where
        S: Iterator<Item = Duration>,
    {
        let Self {
            strategy,
            max_retries,
            max_delay,
        } = self;

        strategy
            .take(max_retries)
            .map(move |delay| delay.min(max_delay))
    }
}

/// The delay sequence used between attempts of the discovery queries.
pub fn relay_retry_strategy() -> impl Iterator<Item = Duration> {
    Clamped::default().iter()
}

/// The delay sequence used between attempts of the acknowledgement
/// discovery, which refreshes the height snapshot before every retry;
/// delays grow linearly instead of by Fibonacci.
pub fn ack_discovery_retry_strategy() -> impl Iterator<Item = Duration> {
    ConstantGrowth::from(INITIAL_RETRY_DELAY)
        .clamp(MAX_RETRY_DELAY, MAX_RETRIES)
        .iter()
}

/// Drive `op` until it succeeds or the delay strategy is exhausted.
///
/// Every failed attempt is logged; the terminal failure is surfaced as
/// `MaxRetriesExceeded` after logging the underlying error.
pub async fn retry_with_strategy<T, F, Fut, S>(
    task: &str,
    strategy: S,
    op: F,
) -> Result<T, Error>
where
    S: Iterator<Item = Duration>,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut delays = strategy;
    let mut attempt = 1usize;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => match delays.next() {
                Some(delay) => {
                    warn!("retryable failure on {} (attempt {}): {}", task, attempt, e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    error!("{} failed on final attempt {}: {}", task, attempt, e);
                    return Err(Error::max_retries_exceeded(task.to_string(), attempt));
                }
            },
        }
    }
}
