use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::error::GenerationError;
use crate::handler::{GenerationRequest, GenerationResponse, RequestHandler};
use crate::orchestrator::Sleeper;
use crate::rate_limit::{RateLimitDecision, RateLimiter, UNKNOWN_IDENTITY};
use crate::replicate::JobClient;

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl IntoResponse for GenerationError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
            detail: match &self {
                GenerationError::Internal(detail) => detail.clone(),
                _ => None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let GenerationError::RateLimited(decision) = &self {
            apply_rate_limit_headers(response.headers_mut(), decision);
        }
        response
    }
}

impl IntoResponse for GenerationResponse {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::OK, Json(&self)).into_response();
        if let Some(decision) = &self.rate_limit {
            apply_rate_limit_headers(response.headers_mut(), decision);
        }
        response
    }
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(decision.reset_at_ms));
}

/// Client identity for rate limiting: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the `unknown` sentinel.
pub fn client_identity(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(UNKNOWN_IDENTITY)
        .to_string()
}

pub fn router<L, C, S>(handler: Arc<RequestHandler<L, C, S>>) -> Router
where
    L: RateLimiter + Send + Sync + 'static,
    C: JobClient + Send + Sync + 'static,
    S: Sleeper + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate::<L, C, S>))
        .with_state(handler)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// An unparseable body becomes an empty request, which fails validation only
/// after the limiter has spent a permit.
///
/// The work runs on its own task, so it completes if the caller disconnects
/// and a panic is reported as a 500.
async fn generate<L, C, S>(
    State(handler): State<Arc<RequestHandler<L, C, S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    L: RateLimiter + Send + Sync + 'static,
    C: JobClient + Send + Sync + 'static,
    S: Sleeper + Send + Sync + 'static,
{
    let identity = client_identity(&headers);
    let request: GenerationRequest = serde_json::from_slice(&body).unwrap_or_default();
    let span = info_span!("generate", request_id = %Uuid::new_v4(), %identity);

    let task = tokio::spawn(
        async move { handler.handle(&request, &identity).await }.instrument(span),
    );

    match task.await {
        Ok(Ok(resp)) => resp.into_response(),
        Ok(Err(e)) => {
            info!(kind = e.kind(), error = %e, "generation request failed");
            e.into_response()
        }
        Err(join_err) => {
            error!(error = %join_err, "generation task aborted");
            GenerationError::Internal(Some("generation task aborted".into())).into_response()
        }
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve<L, C, S>(handler: Arc<RequestHandler<L, C, S>>, port: u16) -> anyhow::Result<()>
where
    L: RateLimiter + Send + Sync + 'static,
    C: JobClient + Send + Sync + 'static,
    S: Sleeper + Send + Sync + 'static,
{
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(handler)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::PollingOrchestrator;
    use crate::rate_limit::{FixedWindowLimiter, Window};
    use crate::replicate::ReplicateClient;
    use serde_json::Value;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn spawn_app(provider: &MockServer, limit: u32) -> String {
        let client = ReplicateClient::with_base_url(
            "r8_test".into(),
            format!("{}/v1/predictions", provider.uri()),
        );
        let limiter = FixedWindowLimiter::new(Window {
            limit,
            length: Duration::from_secs(3600),
        });
        let orchestrator = PollingOrchestrator::new(Duration::from_millis(10), 3);
        let handler = Arc::new(RequestHandler::new(Some(limiter), client, orchestrator));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(handler)).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn mount_provider(server: &MockServer, final_status: Value) {
        let status_url = format!("{}/v1/predictions/abc", server.uri());
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "abc",
                "status": "starting",
                "urls": { "get": status_url }
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(final_status))
            .mount(server)
            .await;
    }

    fn body() -> Value {
        json!({ "imageUrl": "http://x/i.png", "theme": "Modern", "room": "Kitchen" })
    }

    #[test]
    fn identity_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("2.2.2.2"));
        assert_eq!(client_identity(&headers), "1.1.1.1");

        headers.remove("x-forwarded-for");
        assert_eq!(client_identity(&headers), "2.2.2.2");

        assert_eq!(client_identity(&HeaderMap::new()), UNKNOWN_IDENTITY);
    }

    #[test]
    fn rate_limited_response_carries_headers() {
        let response = GenerationError::RateLimited(RateLimitDecision {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset_at_ms: 42,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(response.headers()["x-ratelimit-reset"], "42");
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let response = GenerationError::Timeout { attempts: 30 }.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn health_endpoint() {
        let provider = MockServer::start().await;
        let base = spawn_app(&provider, 5).await;

        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn generate_returns_image() {
        let provider = MockServer::start().await;
        mount_provider(
            &provider,
            json!({ "id": "abc", "status": "succeeded", "output": ["http://x/e.png", "http://x/r.png"] }),
        )
        .await;
        let base = spawn_app(&provider, 5).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/generate"))
            .header("x-forwarded-for", "9.9.9.9")
            .json(&body())
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["x-ratelimit-remaining"], "4");
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json, json!({ "image": "http://x/r.png" }));
    }

    #[tokio::test]
    async fn provider_error_body_is_not_forwarded() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("token r8_secret is invalid"))
            .mount(&provider)
            .await;
        let base = spawn_app(&provider, 5).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/generate"))
            .json(&body())
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 500);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["kind"], "upstream_unavailable");
        assert_eq!(
            json["message"],
            "Image provider unavailable: provider returned status 401"
        );
        assert!(!json.to_string().contains("r8_secret"));
    }

    #[tokio::test]
    async fn missing_field_is_bad_request() {
        let provider = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&provider)
            .await;
        let base = spawn_app(&provider, 5).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/generate"))
            .json(&json!({ "theme": "Modern", "room": "Kitchen" }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["kind"], "invalid_request");
        assert_eq!(json["message"], "Invalid request: imageUrl is required");
    }

    #[tokio::test]
    async fn quota_exhaustion_returns_429() {
        let provider = MockServer::start().await;
        mount_provider(
            &provider,
            json!({ "id": "abc", "status": "succeeded", "output": "http://x/r.png" }),
        )
        .await;
        let base = spawn_app(&provider, 1).await;
        let client = reqwest::Client::new();

        let first = client
            .post(format!("{base}/generate"))
            .json(&body())
            .send()
            .await
            .unwrap();
        assert_eq!(first.status(), 200);

        let second = client
            .post(format!("{base}/generate"))
            .json(&body())
            .send()
            .await
            .unwrap();
        assert_eq!(second.status(), 429);
        assert_eq!(second.headers()["x-ratelimit-limit"], "1");
        assert_eq!(second.headers()["x-ratelimit-remaining"], "0");
        let json: Value = second.json().await.unwrap();
        assert_eq!(json["kind"], "rate_limited");
    }

    #[tokio::test]
    async fn provider_failure_is_500() {
        let provider = MockServer::start().await;
        mount_provider(
            &provider,
            json!({ "id": "abc", "status": "failed", "error": "NSFW content detected" }),
        )
        .await;
        let base = spawn_app(&provider, 5).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/generate"))
            .json(&body())
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 500);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["kind"], "generation_failed");
        assert_eq!(json["message"], "Generation failed: NSFW content detected");
    }

    #[tokio::test]
    async fn endless_pending_is_504() {
        let provider = MockServer::start().await;
        mount_provider(&provider, json!({ "id": "abc", "status": "processing" })).await;
        let base = spawn_app(&provider, 5).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/generate"))
            .json(&body())
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 504);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["kind"], "timeout");
    }
}
