//! Example x402 facilitator service.
//!
//! A facilitator is an intermediary service that verifies payment payloads
//! and settles transactions on-chain, paying the gas fees.
//!
//! Run with:
//! ```bash
//! cargo run --example facilitator
//! ```

use clap::Parser;
use std::sync::Arc;
use x402_core::facilitator::FacilitatorConfig;
use x402_core::facilitator_http::{router, AppState};

/// x402 facilitator service.
#[derive(Parser, Debug)]
struct Args {
    /// Private key used to pay gas for settlements.
    #[arg(long, env = "FACILITATOR_PRIVATE_KEY")]
    facilitator_private_key: String,

    /// Blockchain RPC endpoint.
    #[arg(long, env = "RPC_URL", default_value = "https://mainnet.base.org")]
    rpc_url: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3001)]
    port: u16,

    /// Requests/sec allowed per process before `429`.
    #[arg(long, env = "RATE_LIMIT", default_value_t = 50)]
    rate_limit: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = FacilitatorConfig::new(args.facilitator_private_key, args.rpc_url.clone());
    config.add_supported("exact", "base-sepolia");
    config.add_supported("exact", "ethereum-mainnet");
    config.add_supported("upto", "arbitrum-one");

    let state = Arc::new(AppState::with_rate_limit(config, args.rate_limit));
    let app = router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, rpc_url = %args.rpc_url, "facilitator listening");

    axum::serve(listener, app).await?;

    Ok(())
}
