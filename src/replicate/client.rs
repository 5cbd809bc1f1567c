use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::error::ReplicateError;
use super::types::{PredictionRequest, PredictionResponse};
use crate::state_machine::Job;

pub const API_URL: &str = "https://api.replicate.com/v1/predictions";

/// Submits generation jobs and checks their status.
///
/// Neither operation retries; retry policy belongs to the caller.
pub trait JobClient {
    fn submit(
        &self,
        image_url: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<Job, ReplicateError>> + Send;

    fn poll(&self, job: &Job) -> impl Future<Output = Result<Job, ReplicateError>> + Send;
}

pub struct ReplicateClient {
    api_token: String,
    client: Client,
    base_url: String,
}

impl ReplicateClient {
    /// Create a client for the given predictions endpoint ([`API_URL`] in production).
    pub fn with_base_url(api_token: String, base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            api_token,
            client,
            base_url,
        }
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.api_token)
    }

    async fn read_prediction(
        response: reqwest::Response,
    ) -> Result<PredictionResponse, ReplicateError> {
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!(status = status.as_u16(), body = %message, "provider rejected request");
            return Err(ReplicateError::Unavailable {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<PredictionResponse>(&body)
            .map_err(|e| ReplicateError::Protocol(format!("invalid prediction body: {e}")))
    }
}

impl JobClient for ReplicateClient {
    async fn submit(&self, image_url: &str, prompt: &str) -> Result<Job, ReplicateError> {
        let req = PredictionRequest::new(image_url, prompt);
        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", self.auth_header())
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await?;

        let ack = Self::read_prediction(response).await?;
        let status_url = ack
            .status_url()
            .ok_or_else(|| {
                ReplicateError::Protocol("submission acknowledgment has no status URL".into())
            })?
            .to_string();
        let id = ack.id.clone().unwrap_or_else(|| status_url.clone());

        debug!(job_id = %id, "prediction submitted");
        let job = Job::new(id, status_url);
        Ok(job.observe(&ack))
    }

    async fn poll(&self, job: &Job) -> Result<Job, ReplicateError> {
        let response = self
            .client
            .get(&job.status_url)
            .header("Authorization", self.auth_header())
            .header("content-type", "application/json")
            .send()
            .await?;

        let body = Self::read_prediction(response).await?;
        Ok(job.observe(&body))
    }
}
