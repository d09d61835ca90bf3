//! Timing policies: sleeping, polling and serialized sections.
//!
//! All waiting goes through a [`Sleeper`], so the whole write path can run
//! without real delays under test.

use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Source of delays.
#[async_trait]
pub trait Sleeper: Send + Sync + fmt::Debug {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Outcome of one poll probe.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState<T> {
    Pending,
    Done(T),
}

/// How often and how long to poll.
///
/// Without `max_attempts` or `deadline` the poll only ends when the probe
/// returns done or fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    /// Upper bound on the total time spent sleeping between probes.
    pub deadline: Option<Duration>,
}

impl PollPolicy {
    /// Polls at a fixed interval with no bound.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Calls `probe` until it reports done, sleeping `policy.interval` between
/// calls. A probe error ends the poll immediately.
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
    what: &str,
    mut probe: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<PollState<T>>>,
{
    let mut attempts = 0u32;
    let mut waited = Duration::ZERO;
    loop {
        attempts += 1;
        if let PollState::Done(value) = probe().await? {
            debug!(what, attempts, "poll finished");
            return Ok(value);
        }
        let out_of_attempts = policy.max_attempts.is_some_and(|max| attempts >= max);
        let out_of_time = policy
            .deadline
            .is_some_and(|deadline| waited + policy.interval > deadline);
        if out_of_attempts || out_of_time {
            return Err(ProviderError::PollExhausted {
                what: what.to_string(),
                attempts,
            });
        }
        sleeper.sleep(policy.interval).await;
        waited += policy.interval;
    }
}

/// A mutex that waits an extra settle delay whenever it had to queue.
///
/// Used where the backend misbehaves under concurrent writes to sibling
/// entities and needs a moment after the previous writer finished.
#[derive(Debug)]
pub struct CriticalSection {
    lock: Mutex<()>,
    settle_delay: Duration,
}

impl CriticalSection {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            settle_delay,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Enters the section. The settle delay is slept only when another
    /// holder had to be waited for.
    pub async fn enter(&self, sleeper: &dyn Sleeper) -> MutexGuard<'_, ()> {
        self.enter_settling(sleeper, self.settle_delay).await
    }

    /// Enters the section, settling for `settle_delay` instead of the
    /// section's own delay.
    pub async fn enter_settling(&self, sleeper: &dyn Sleeper, settle_delay: Duration) -> MutexGuard<'_, ()> {
        if let Ok(guard) = self.lock.try_lock() {
            return guard;
        }
        let guard = self.lock.lock().await;
        debug!(delay_ms = settle_delay.as_millis() as u64, "lock was contended, settling");
        sleeper.sleep(settle_delay).await;
        guard
    }
}
