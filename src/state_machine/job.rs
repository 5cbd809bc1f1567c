use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::replicate::PredictionResponse;

/// Lifecycle status of a provider job.
///
/// A job only ever moves `Pending -> Succeeded` or `Pending -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Map the provider's raw status string.
    ///
    /// Anything that is not recognisably terminal counts as pending.
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "succeeded" => JobStatus::Succeeded,
            "failed" | "canceled" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Succeeded => write!(f, "SUCCEEDED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// A submitted generation job, as last reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Reference used for every status check.
    pub status_url: String,
    pub status: JobStatus,
    pub output: Option<String>,
    /// Provider-reported failure reason, or the raw terminal status.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: String, status_url: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            status_url,
            status: JobStatus::Pending,
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Return a copy of this job updated with a freshly fetched provider response.
    ///
    /// The receiver is never modified; a new snapshot is produced per fetch.
    pub fn observe(&self, response: &PredictionResponse) -> Self {
        let status = JobStatus::from_provider(&response.status);
        let error = match status {
            JobStatus::Failed => Some(
                response
                    .error
                    .clone()
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| format!("prediction {}", response.status)),
            ),
            _ => None,
        };

        Self {
            id: response.id.clone().unwrap_or_else(|| self.id.clone()),
            status_url: self.status_url.clone(),
            status,
            output: response.output_url(),
            error,
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }
}
