use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{Job, JobStatus};
use crate::replicate::ReplicateError;

/// Result of driving a job to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollOutcome {
    /// The job finished with a non-empty output URL.
    Succeeded(String),
    /// The provider reported a terminal failure.
    Failed(String),
    /// The attempt budget ran out while the job was still pending.
    TimedOut,
    /// The budget ran out and the final attempt could not read a usable status.
    TransientError(String),
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollOutcome::Succeeded(url) => write!(f, "succeeded: {url}"),
            PollOutcome::Failed(reason) => write!(f, "failed: {reason}"),
            PollOutcome::TimedOut => write!(f, "timed out"),
            PollOutcome::TransientError(msg) => write!(f, "transient error: {msg}"),
        }
    }
}

/// What the orchestrator should do after one status check.
#[derive(Debug)]
pub enum Transition {
    /// Still pending; keep the refreshed job and check again.
    Wait(Job),
    /// Nothing usable came back; spend the attempt and check again.
    Retry(String),
    /// Terminal. Stop polling.
    Complete(PollOutcome),
}

/// Pure classification of a single status-check result.
pub struct PollMachine;

impl PollMachine {
    /// Compute the transition for one observation.
    ///
    /// - `Succeeded` with an output completes; without one it is retried,
    ///   since the provider can report success before the output is attached.
    /// - `Failed` completes immediately and is never retried.
    /// - `Pending` waits.
    /// - A transport or protocol error is retried.
    pub fn next(observed: Result<Job, ReplicateError>) -> Transition {
        let job = match observed {
            Ok(job) => job,
            Err(e) => return Transition::Retry(e.to_string()),
        };

        match job.status {
            JobStatus::Succeeded => match job.output {
                Some(url) if !url.is_empty() => Transition::Complete(PollOutcome::Succeeded(url)),
                _ => Transition::Retry(format!("job {} succeeded without output", job.id)),
            },
            JobStatus::Failed => Transition::Complete(PollOutcome::Failed(
                job.error.unwrap_or_else(|| "generation failed".to_string()),
            )),
            JobStatus::Pending => Transition::Wait(job),
        }
    }
}
