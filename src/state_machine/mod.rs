mod job;
mod poll;

pub use job::{Job, JobStatus};
pub use poll::{PollMachine, PollOutcome, Transition};
