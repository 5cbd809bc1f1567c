use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::GenerationError;
use crate::orchestrator::{PollingOrchestrator, Sleeper, TokioSleeper};
use crate::prompt::PromptBuilder;
use crate::rate_limit::{Limiter, RateLimitDecision, RateLimiter};
use crate::replicate::{JobClient, ReplicateClient};
use crate::state_machine::PollOutcome;

/// Inbound payload. Fields are optional here so that missing ones surface as
/// `InvalidRequest` rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
}

/// A request whose three fields are present and non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidRequest<'a> {
    pub image_url: &'a str,
    pub theme: &'a str,
    pub room: &'a str,
}

impl GenerationRequest {
    pub fn new(image_url: &str, theme: &str, room: &str) -> Self {
        Self {
            image_url: Some(image_url.to_string()),
            theme: Some(theme.to_string()),
            room: Some(room.to_string()),
        }
    }

    pub fn validate(&self) -> Result<ValidRequest<'_>, GenerationError> {
        Ok(ValidRequest {
            image_url: required(&self.image_url, "imageUrl")?,
            theme: required(&self.theme, "theme")?,
            room: required(&self.room, "room")?,
        })
    }
}

// Presence only: the value is passed on untouched, whitespace included.
fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, GenerationError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(GenerationError::InvalidRequest(format!("{field} is required"))),
    }
}

/// Successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResponse {
    pub image: String,
    /// Quota state after this request, when a limiter is configured.
    #[serde(skip)]
    pub rate_limit: Option<RateLimitDecision>,
}

/// One request/response cycle: rate limit, validate, build prompt, submit,
/// poll.
///
/// The limiter runs before validation, so a malformed request still spends
/// a permit.
pub struct RequestHandler<L, C, S = TokioSleeper> {
    limiter: Option<L>,
    client: C,
    orchestrator: PollingOrchestrator<S>,
}

impl RequestHandler<Limiter, ReplicateClient> {
    pub fn from_config(config: &AppConfig) -> Self {
        let client =
            ReplicateClient::with_base_url(config.api_token.clone(), config.api_base_url.clone());
        let orchestrator = PollingOrchestrator::new(
            Duration::from_millis(config.polling.interval_ms),
            config.polling.max_attempts,
        );
        Self::new(Limiter::from_config(&config.rate_limit), client, orchestrator)
    }

    pub fn limiter_backend(&self) -> Option<&'static str> {
        self.limiter.as_ref().map(Limiter::backend_name)
    }
}

impl<L, C, S> RequestHandler<L, C, S>
where
    L: RateLimiter,
    C: JobClient,
    S: Sleeper,
{
    pub fn new(limiter: Option<L>, client: C, orchestrator: PollingOrchestrator<S>) -> Self {
        Self {
            limiter,
            client,
            orchestrator,
        }
    }

    pub async fn handle(
        &self,
        request: &GenerationRequest,
        identity: &str,
    ) -> Result<GenerationResponse, GenerationError> {
        let rate_limit = self.enforce_rate_limit(identity).await?;
        let valid = request.validate()?;

        let prompt = PromptBuilder::build(valid.theme, valid.room);
        info!(%identity, %prompt, "submitting generation");

        let job = self.client.submit(valid.image_url, &prompt).await?;
        info!(job_id = %job.id, "generation submitted, polling for result");

        match self.orchestrator.run(&self.client, job).await {
            PollOutcome::Succeeded(image) => Ok(GenerationResponse { image, rate_limit }),
            PollOutcome::Failed(reason) => Err(GenerationError::GenerationFailed(reason)),
            PollOutcome::TimedOut => Err(GenerationError::Timeout {
                attempts: self.orchestrator.max_attempts,
            }),
            PollOutcome::TransientError(reason) => Err(GenerationError::UpstreamUnavailable(reason)),
        }
    }

    /// Spend one permit. A backend failure lets the request through.
    async fn enforce_rate_limit(
        &self,
        identity: &str,
    ) -> Result<Option<RateLimitDecision>, GenerationError> {
        let Some(limiter) = &self.limiter else {
            return Ok(None);
        };

        match limiter.check(identity).await {
            Ok(decision) if decision.allowed => Ok(Some(decision)),
            Ok(decision) => {
                info!(%identity, limit = decision.limit, "rate limit exceeded");
                Err(GenerationError::RateLimited(decision))
            }
            Err(e) => {
                warn!(%identity, error = %e, "rate limiter unavailable, allowing request");
                Ok(None)
            }
        }
    }
}
