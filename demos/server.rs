//! Example x402-protected resource server using Axum.
//!
//! Demonstrates gating a route behind payment using [`x402_core::gateway`],
//! delegating verification/settlement to a separately running facilitator.
//!
//! Run with:
//! ```bash
//! cargo run --example server
//! ```

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use x402_core::gateway::{gate, GateResult, RouteConfig};

/// x402-protected example resource server.
#[derive(Parser, Debug)]
struct Args {
    /// Address that receives settled payments.
    #[arg(long, env = "PAY_TO", default_value = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb")]
    pay_to: String,

    /// URL of the facilitator service this gateway delegates to.
    #[arg(long, env = "FACILITATOR_URL", default_value = "http://localhost:3001")]
    facilitator_url: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
}

struct AppState {
    client: reqwest::Client,
    route: RouteConfig,
}

/// Protected endpoint that requires payment.
async fn weather_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let payment_header = headers
        .get("X-PAYMENT")
        .and_then(|v| v.to_str().ok());

    match gate(&state.client, &state.route, "/weather", payment_header, None).await {
        Ok(GateResult::PaymentRequired(response)) => {
            (StatusCode::PAYMENT_REQUIRED, Json(response)).into_response()
        }
        Ok(GateResult::Rejected(reason)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
        }
        Ok(GateResult::Allowed { tx_hash, payment_response_header }) => {
            let mut response_headers = axum::http::HeaderMap::new();
            if let Some(header) = &payment_response_header {
                if let Ok(value) = axum::http::HeaderValue::from_str(header) {
                    response_headers.insert("x-payment-response", value);
                }
            }
            (
                StatusCode::OK,
                response_headers,
                Json(json!({
                    "location": "San Francisco",
                    "temperature": 68,
                    "conditions": "Sunny",
                    "humidity": 65,
                    "paid": true,
                    "tx_hash": tx_hash,
                })),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Health check endpoint (no payment required).
async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "healthy", "protocol": "x402", "version": 1}))
}

/// Root endpoint with information.
async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "message": "x402 example resource server",
        "endpoints": {
            "/weather": "Weather data (requires $0.01 payment)",
            "/health": "Health check (free)"
        },
        "protocol": "x402",
        "version": 1,
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let route = RouteConfig::new(
        args.pay_to.clone(),
        "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", // USDC on Base
        6,
        "base-mainnet",
        "exact",
        0.01,
        "Weather API access",
        args.facilitator_url.clone(),
    )
    .with_timeout(300)
    .with_token_metadata("USD Coin", "2");

    let state = Arc::new(AppState {
        client: reqwest::Client::new(),
        route,
    });

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/weather", get(weather_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, facilitator_url = %args.facilitator_url, "resource server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
