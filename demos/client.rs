//! Example x402 client.
//!
//! Demonstrates making requests to an x402-enabled server, automatically
//! handling payment requirements.
//!
//! Run with:
//! ```bash
//! cargo run --example client
//! ```

use clap::Parser;
use x402_core::client::{get, X402ClientConfig};

/// Example x402 client.
#[derive(Parser, Debug)]
struct Args {
    /// Private key used to sign payment authorizations.
    #[arg(long, env = "PRIVATE_KEY")]
    private_key: Option<String>,

    /// Blockchain RPC endpoint.
    #[arg(long, env = "RPC_URL", default_value = "https://mainnet.base.org")]
    rpc_url: String,

    /// The protected API endpoint to access.
    #[arg(long, env = "API_URL", default_value = "http://localhost:3000/weather")]
    api_url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let private_key = args.private_key.unwrap_or_else(|| {
        tracing::warn!("no PRIVATE_KEY set, using example key (do not use in production)");
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string()
    });

    tracing::info!(rpc_url = %args.rpc_url, api_url = %args.api_url, "x402 example client");

    let config = X402ClientConfig::new(&private_key, &args.rpc_url)
        .with_scheme("exact")
        .with_network("base-mainnet");

    let response = get(&config, &args.api_url).await?;
    let status = response.status();
    tracing::info!(%status, "response received");

    if let Some(payment_response) = response.headers().get("X-PAYMENT-RESPONSE") {
        if let Ok(value) = payment_response.to_str() {
            tracing::info!(payment_response = %value, "payment settled");
        }
    }

    let body = response.text().await?;
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }

    Ok(())
}
