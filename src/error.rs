use thiserror::Error;

use crate::rate_limit::RateLimitDecision;
use crate::replicate::ReplicateError;

/// Failures surfaced to callers of a generation request.
///
/// Every variant has a stable [`kind`](GenerationError::kind) string and an
/// HTTP status, so the transport layer never has to inspect messages.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded: {} generations per window", .0.limit)]
    RateLimited(RateLimitDecision),

    #[error("Image provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Image provider protocol error: {0}")]
    UpstreamProtocolError(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation did not finish after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("Internal server error")]
    Internal(Option<String>),
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::InvalidRequest(_) => "invalid_request",
            GenerationError::RateLimited(_) => "rate_limited",
            GenerationError::UpstreamUnavailable(_) => "upstream_unavailable",
            GenerationError::UpstreamProtocolError(_) => "upstream_protocol_error",
            GenerationError::GenerationFailed(_) => "generation_failed",
            GenerationError::Timeout { .. } => "timeout",
            GenerationError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            GenerationError::InvalidRequest(_) => 400,
            GenerationError::RateLimited(_) => 429,
            GenerationError::Timeout { .. } => 504,
            GenerationError::UpstreamUnavailable(_)
            | GenerationError::UpstreamProtocolError(_)
            | GenerationError::GenerationFailed(_)
            | GenerationError::Internal(_) => 500,
        }
    }

    /// Whether repeating the whole request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited(_)
                | GenerationError::UpstreamUnavailable(_)
                | GenerationError::Timeout { .. }
        )
    }
}

impl From<ReplicateError> for GenerationError {
    fn from(err: ReplicateError) -> Self {
        match err {
            ReplicateError::Protocol(msg) => GenerationError::UpstreamProtocolError(msg),
            other => GenerationError::UpstreamUnavailable(other.to_string()),
        }
    }
}

/// Failures talking to a rate-limit backend.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit backend returned status {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Unexpected rate limit backend response: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),
}
