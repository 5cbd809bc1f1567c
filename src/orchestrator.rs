use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::replicate::JobClient;
use crate::state_machine::{Job, PollMachine, PollOutcome, Transition};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Waits between status checks.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Drives a submitted job to a terminal status with a fixed interval and a
/// bounded number of status checks.
///
/// Worst-case wait is `max_attempts * interval`. There is no backoff.
pub struct PollingOrchestrator<S = TokioSleeper> {
    pub interval: Duration,
    pub max_attempts: u32,
    sleeper: S,
}

impl PollingOrchestrator {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self::with_sleeper(interval, max_attempts, TokioSleeper)
    }
}

impl<S: Sleeper> PollingOrchestrator<S> {
    pub fn with_sleeper(interval: Duration, max_attempts: u32, sleeper: S) -> Self {
        Self {
            interval,
            max_attempts,
            sleeper,
        }
    }

    /// Poll `job` until it is terminal or the attempt budget is spent.
    ///
    /// Each status check, including one that fails in transport, costs one
    /// attempt. The loop sleeps between attempts but not after the last one.
    /// If the final attempt produced no usable status the result is
    /// `TransientError`, otherwise an exhausted budget is `TimedOut`.
    pub async fn run<C: JobClient>(&self, client: &C, job: Job) -> PollOutcome {
        let mut job = job;
        let mut last_error: Option<String> = None;

        for attempt in 1..=self.max_attempts {
            let observed = client.poll(&job).await;

            match PollMachine::next(observed) {
                Transition::Complete(outcome) => {
                    info!(job_id = %job.id, attempt, %outcome, "job reached terminal status");
                    return outcome;
                }
                Transition::Wait(updated) => {
                    debug!(job_id = %updated.id, attempt, status = %updated.status, "job still pending");
                    job = updated;
                    last_error = None;
                }
                Transition::Retry(reason) => {
                    warn!(job_id = %job.id, attempt, %reason, "status check gave no usable result");
                    last_error = Some(reason);
                }
            }

            if attempt < self.max_attempts {
                self.sleeper.sleep(self.interval).await;
            }
        }

        warn!(job_id = %job.id, attempts = self.max_attempts, "polling budget exhausted");
        match last_error {
            Some(reason) => PollOutcome::TransientError(reason),
            None => PollOutcome::TimedOut,
        }
    }
}
