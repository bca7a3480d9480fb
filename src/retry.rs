use std::thread;
use std::time::Duration;

use crate::error::FetchError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Outcome of one attempt. Terminal failures travel as `Err(FetchError)`.
#[derive(Debug)]
pub enum Attempt<T> {
    Ready(T),
    Retry(String),
}

#[derive(Debug)]
pub enum RetryOutcome<T> {
    Done(T),
    Exhausted { attempts: u32, last_reason: String },
}

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Linear backoff: attempt `i` (zero based) waits `base_delay + i * step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_secs(2),
            step: Duration::from_secs(1),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay + self.step * attempt
    }

    /// Runs `attempt` until it is ready, fails terminally, or the attempt
    /// budget is spent.
    ///
    /// No sleep follows the final attempt: five failures wait 2+3+4+5 s and
    /// then report, instead of pausing another 6 s before giving up.
    pub fn run<T, S, F>(
        &self,
        sleeper: &S,
        url: &str,
        mut attempt: F,
    ) -> Result<RetryOutcome<T>, FetchError>
    where
        S: Sleeper + ?Sized,
        F: FnMut(u32) -> Result<Attempt<T>, FetchError>,
    {
        let mut last_reason = String::new();
        for index in 0..self.max_attempts {
            match attempt(index)? {
                Attempt::Ready(value) => return Ok(RetryOutcome::Done(value)),
                Attempt::Retry(reason) => {
                    tracing::warn!(url, attempt = index + 1, %reason, "attempt failed");
                    last_reason = reason;
                    if index + 1 < self.max_attempts {
                        sleeper.sleep(self.delay_for(index));
                    }
                }
            }
        }
        Ok(RetryOutcome::Exhausted {
            attempts: self.max_attempts,
            last_reason,
        })
    }
}
