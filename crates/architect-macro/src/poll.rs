//! Fixed-budget polling for values that appear asynchronously in an external system.

use std::time::{Duration, SystemTime};

/// Time kept in reserve before the invocation deadline so a callback can still
/// be delivered after polling gives up.
pub const DEADLINE_MARGIN: Duration = Duration::from_secs(5);

/// Backoff policy controlling the delay between poll attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffPolicy {
    /// Fixed delay between attempts.
    Fixed(Duration),
    /// No delay between attempts.
    None,
}

impl BackoffPolicy {
    /// Compute the delay after a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, _attempt: usize) -> Duration {
        match self {
            BackoffPolicy::Fixed(d) => *d,
            BackoffPolicy::None => Duration::ZERO,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Fixed(Duration::from_secs(10))
    }
}

/// Hard attempt cap plus the delay between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub max_attempts: usize,
    pub backoff: BackoffPolicy,
}

impl PollPolicy {
    pub fn new(max_attempts: usize, backoff: BackoffPolicy) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Worst-case time spent sleeping across all attempts.
    pub fn budget(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.backoff.delay_for_attempt(attempt))
            .sum()
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(10, BackoffPolicy::default())
    }
}

/// Result of a single poll attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep<T, D> {
    /// The awaited value is available.
    Ready(T),
    /// Not there yet; carries the raw observation for diagnosis.
    Pending(D),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T, D> {
    Ready { value: T, attempts: usize },
    Exhausted { attempts: usize, last: Option<D> },
}

/// Call `f` until it reports `Ready`, the attempt budget is spent, or the
/// next sleep would run past `deadline`.
///
/// An error from `f` ends polling immediately and is returned as-is; faults
/// are never retried.
pub async fn poll_until<F, Fut, T, D>(
    policy: &PollPolicy,
    deadline: Option<SystemTime>,
    mut f: F,
) -> architect_types::Result<PollOutcome<T, D>>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = architect_types::Result<PollStep<T, D>>>,
{
    let mut last = None;
    let mut attempts = 0;

    while attempts < policy.max_attempts {
        attempts += 1;
        match f(attempts).await? {
            PollStep::Ready(value) => return Ok(PollOutcome::Ready { value, attempts }),
            PollStep::Pending(observed) => last = Some(observed),
        }

        if attempts == policy.max_attempts {
            break;
        }

        let delay = policy.backoff.delay_for_attempt(attempts);
        if let Some(deadline) = deadline {
            if SystemTime::now() + delay + DEADLINE_MARGIN >= deadline {
                tracing::warn!(attempt = attempts, "Invocation deadline too close, giving up polling");
                break;
            }
        }

        tracing::info!(attempt = attempts, delay_ms = %delay.as_millis(), "Not ready, polling again");
        tokio::time::sleep(delay).await;
    }

    Ok(PollOutcome::Exhausted { attempts, last })
}
