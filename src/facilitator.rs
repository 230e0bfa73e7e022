//! Facilitator service implementation for the x402 protocol.
//!
//! A facilitator is an optional intermediary service that verifies payment
//! payloads and settles transactions on-chain. This module wires together
//! the [`crate::verifier`] and [`crate::settler`] pipelines behind the
//! `/verify`, `/settle`, and `/supported` operations; [`crate::facilitator_http`]
//! exposes them over HTTP.

use crate::errors::{Result, X402Error};
use crate::metrics::Metrics;
use crate::nonce_cache::NonceCache;
use crate::settler::Settler;
use crate::types::{SettlementRequest, SettlementResponse, SupportedKind, SupportedResponse, VerificationRequest, VerificationResponse};
use crate::verifier::Verifier;
use ethers::signers::{LocalWallet, Signer};
use std::sync::Arc;

/// Configuration and shared state for a facilitator service.
#[derive(Clone)]
pub struct FacilitatorConfig {
    /// Private key for the facilitator (to pay gas for settlements)
    pub private_key: String,

    /// RPC URL for blockchain interactions
    pub rpc_url: String,

    /// List of supported (scheme, network) combinations
    pub supported: Vec<(String, String)>,

    /// Bounded, TTL'd replay cache shared by the verifier.
    pub nonce_cache: Arc<NonceCache>,

    /// Process-wide metrics, shared by the verifier, settler, and HTTP surface.
    pub metrics: Arc<Metrics>,
}

impl FacilitatorConfig {
    /// Creates a new facilitator configuration.
    pub fn new(private_key: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            rpc_url: rpc_url.into(),
            supported: vec![
                ("exact".to_string(), "base-mainnet".to_string()),
                ("upto".to_string(), "base-mainnet".to_string()),
            ],
            nonce_cache: Arc::new(NonceCache::new()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Adds a supported (scheme, network) combination.
    pub fn add_supported(&mut self, scheme: impl Into<String>, network: impl Into<String>) {
        self.supported.push((scheme.into(), network.into()));
    }

    /// Checks if a (scheme, network) combination is supported.
    pub fn is_supported(&self, scheme: &str, network: &str) -> bool {
        self.supported.iter().any(|(s, n)| s == scheme && n == network)
    }

    /// Derives the facilitator's on-chain address from its private key.
    pub fn address(&self) -> Result<String> {
        let wallet = self
            .private_key
            .parse::<LocalWallet>()
            .map_err(|e| X402Error::InvalidPayload(format!("invalid private key: {e}")))?;
        Ok(format!("{:?}", wallet.address()))
    }

    fn verifier(&self) -> Verifier {
        Verifier::new(self.rpc_url.clone(), Arc::clone(&self.nonce_cache), Arc::clone(&self.metrics))
    }

    fn settler(&self) -> Settler {
        Settler::new(self.rpc_url.clone(), self.private_key.clone(), Arc::clone(&self.metrics))
    }
}

/// Handles the `/verify` endpoint: verifies a payment payload without
/// executing it on-chain.
pub async fn handle_verify(request: VerificationRequest, config: &FacilitatorConfig) -> Result<VerificationResponse> {
    if !config.is_supported(&request.payment_requirements.scheme, &request.payment_requirements.network) {
        return Ok(VerificationResponse {
            is_valid: false,
            invalid_reason: Some(format!(
                "unsupported scheme/network: {}/{}",
                request.payment_requirements.scheme, request.payment_requirements.network
            )),
        });
    }
    Ok(config.verifier().verify(&request).await)
}

/// Handles the `/settle` endpoint: verifies and executes a payment on-chain.
pub async fn handle_settle(request: SettlementRequest, config: &FacilitatorConfig) -> Result<SettlementResponse> {
    if !config.is_supported(&request.payment_requirements.scheme, &request.payment_requirements.network) {
        return Ok(SettlementResponse {
            success: false,
            tx_hash: String::new(),
            network_id: request.payment_requirements.network.clone(),
            actual_amount: String::new(),
            block_number: None,
            error: Some(format!(
                "unsupported scheme/network: {}/{}",
                request.payment_requirements.scheme, request.payment_requirements.network
            )),
        });
    }
    let verifier = config.verifier();
    Ok(config.settler().settle(&request, &verifier).await)
}

/// Handles the `/supported` endpoint.
pub async fn handle_supported(config: &FacilitatorConfig) -> Result<SupportedResponse> {
    let supported = config
        .supported
        .iter()
        .map(|(scheme, network)| SupportedKind {
            scheme: scheme.clone(),
            network: network.clone(),
            assets: None,
        })
        .collect();

    Ok(SupportedResponse { supported })
}
