//! Axum HTTP surface for the facilitator: `/health`, `/status`, `/metrics`,
//! `/supported`, `/verify`, `/settle`, `/estimate-gas`.
//!
//! Every response carries `X-Request-ID`. A token-bucket rate limiter gates
//! all routes (default 50 req/s, `429` on exhaustion). Validation failures
//! return `400`; uncaught errors return `500` with the error message only —
//! never a stack trace, never the private key. CORS is wide open since
//! callers are wallets and browser-side x402 clients on arbitrary origins.

use crate::facilitator::{handle_settle, handle_supported, handle_verify, FacilitatorConfig};
use crate::resilience::TokenBucket;
use crate::types::{SettlementRequest, VerificationRequest};
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";
const DEFAULT_RATE_LIMIT_PER_SEC: u32 = 50;

/// Shared state behind every route.
pub struct AppState {
    pub config: FacilitatorConfig,
    pub rate_limiter: TokenBucket,
}

impl AppState {
    pub fn new(config: FacilitatorConfig) -> Self {
        Self::with_rate_limit(config, DEFAULT_RATE_LIMIT_PER_SEC)
    }

    pub fn with_rate_limit(config: FacilitatorConfig, requests_per_sec: u32) -> Self {
        Self {
            config,
            rate_limiter: TokenBucket::new(requests_per_sec, requests_per_sec),
        }
    }
}

/// Builds the facilitator's Axum router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/metrics", get(prometheus_metrics))
        .route("/supported", get(supported))
        .route("/verify", post(verify))
        .route("/settle", post(settle))
        .route("/estimate-gas", post(estimate_gas))
        .layer(middleware::from_fn(rate_limit_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn request_id_middleware(req: axum::extract::Request, next: Next) -> Response {
    let request_id = Uuid::now_v7().to_string();
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    if state.rate_limiter.try_consume() {
        next.run(req).await
    } else {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": "Rate limit exceeded"})),
        )
            .into_response()
    }
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.config.metrics.snapshot(0).uptime_seconds;
    let facilitator = state.config.address().unwrap_or_default();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": uptime,
        "facilitator": facilitator,
    }))
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.config.metrics.snapshot(state.config.nonce_cache.len());
    Json(snapshot)
}

async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .config
        .metrics
        .prometheus_text(state.config.nonce_cache.len());
    (
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

async fn supported(State(state): State<Arc<AppState>>) -> Response {
    match handle_supported(&state.config).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn verify(State(state): State<Arc<AppState>>, Json(request): Json<VerificationRequest>) -> Response {
    if let Err(e) = crate::validation::validate_requirements(&request.payment_requirements) {
        return bad_request(e.to_string());
    }
    match handle_verify(request, &state.config).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn settle(State(state): State<Arc<AppState>>, Json(request): Json<SettlementRequest>) -> Response {
    if let Err(e) = crate::validation::validate_requirements(&request.payment_requirements) {
        return bad_request(e.to_string());
    }
    match handle_settle(request, &state.config).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Deserialize)]
struct EstimateGasRequest {
    network: String,
}

#[derive(Serialize)]
struct EstimateGasResponse {
    #[serde(rename = "gasEstimate")]
    gas_estimate: u64,
    #[serde(rename = "gasCostUsd")]
    gas_cost_usd: f64,
}

async fn estimate_gas(Json(request): Json<EstimateGasRequest>) -> Response {
    const BASE_TRANSFER_GAS_UNITS: u64 = 65_000;
    let Some(network) = crate::networks::Network::from_id(&request.network) else {
        return bad_request(format!("unsupported network: {}", request.network));
    };
    let info = network.info();
    let gas_estimate = (BASE_TRANSFER_GAS_UNITS as f64 * info.gas_multiplier) as u64;
    let gas_cost_usd =
        gas_estimate as f64 * info.approx_gas_price_gwei * 1e-9 * info.native_token_usd_price;
    Json(EstimateGasResponse {
        gas_estimate,
        gas_cost_usd,
    })
    .into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}

fn internal_error(error: crate::errors::X402Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": error.to_string()})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_ok() {
        let state = Arc::new(AppState::new(FacilitatorConfig::new("0xkey", "https://rpc.url")));
        let app = router(state);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }
}
