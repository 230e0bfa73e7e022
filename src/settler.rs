//! Facilitator-side payment settlement pipeline.
//!
//! Re-verifies, dispatches to the scheme's `settle` (which simulates before
//! broadcasting), and wraps the whole attempt in [`RetryPolicy`] — except
//! for structural rejections (nonce replay, insufficient funds), which are
//! never retried.

use crate::errors::{Result, X402Error};
use crate::metrics::Metrics;
use crate::resilience::RetryPolicy;
use crate::schemes::{exact_evm::ExactEvm, upto_evm::UptoEvm, Scheme};
use crate::types::{SettlementRequest, SettlementResponse, TransferAuthorization};
use crate::verifier::Verifier;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Dependencies the settler needs, held by the facilitator for its lifetime.
pub struct Settler {
    pub rpc_url: String,
    pub facilitator_private_key: String,
    pub retry_policy: RetryPolicy,
    pub metrics: Arc<Metrics>,
}

impl Settler {
    pub fn new(rpc_url: impl Into<String>, facilitator_private_key: impl Into<String>, metrics: Arc<Metrics>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            facilitator_private_key: facilitator_private_key.into(),
            retry_policy: RetryPolicy::settler_default(),
            metrics,
        }
    }

    fn scheme_for(&self, name: &str) -> Option<Arc<dyn Scheme>> {
        match name {
            "exact" => Some(Arc::new(ExactEvm::new())),
            "upto" => Some(Arc::new(UptoEvm::new())),
            _ => None,
        }
    }

    /// Runs verify-then-settle, retrying transient failures per policy, and
    /// records settlement metrics regardless of outcome.
    pub async fn settle(&self, request: &SettlementRequest, verifier: &Verifier) -> SettlementResponse {
        let start = Instant::now();
        let response = self.settle_inner(request, verifier).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        self.metrics.record_settle(response.success, latency_ms, 0);
        debug!(success = response.success, latency_ms, "settlement complete");
        response
    }

    async fn settle_inner(&self, request: &SettlementRequest, verifier: &Verifier) -> SettlementResponse {
        let verification = verifier
            .verify(&crate::types::VerificationRequest {
                payment_header: request.payment_header.clone(),
                payment_requirements: request.payment_requirements.clone(),
            })
            .await;

        let network_id = request.payment_requirements.network.clone();

        if !verification.is_valid {
            return SettlementResponse {
                success: false,
                tx_hash: String::new(),
                network_id,
                actual_amount: String::new(),
                block_number: None,
                error: verification.invalid_reason,
            };
        }

        let payload = match crate::codec::decode_payment_header(&request.payment_header) {
            Ok(p) => p,
            Err(e) => {
                return SettlementResponse {
                    success: false,
                    tx_hash: String::new(),
                    network_id,
                    actual_amount: String::new(),
                    block_number: None,
                    error: Some(e.to_string()),
                }
            }
        };

        let Some(scheme) = self.scheme_for(&payload.scheme) else {
            return SettlementResponse {
                success: false,
                tx_hash: String::new(),
                network_id,
                actual_amount: String::new(),
                block_number: None,
                error: Some(format!("unsupported scheme: {}", payload.scheme)),
            };
        };

        let actual_amount = serde_json::from_value::<TransferAuthorization>(payload.payload.clone())
            .map(|auth| auth.value)
            .unwrap_or_default();

        let requirements = request.payment_requirements.clone();
        let rpc_url = self.rpc_url.clone();
        let key = self.facilitator_private_key.clone();

        let result: Result<String> = self
            .retry_policy
            .execute(
                || {
                    let scheme = Arc::clone(&scheme);
                    let payload = payload.clone();
                    let requirements = requirements.clone();
                    let rpc_url = rpc_url.clone();
                    let key = key.clone();
                    async move { scheme.settle(&payload, &requirements, &rpc_url, &key).await }
                },
                is_retryable_settlement_error,
            )
            .await;

        match result {
            Ok(tx_hash) => SettlementResponse {
                success: true,
                tx_hash,
                network_id,
                actual_amount,
                block_number: None,
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "settlement failed after retries");
                SettlementResponse {
                    success: false,
                    tx_hash: String::new(),
                    network_id,
                    actual_amount: String::new(),
                    block_number: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Retry predicate for the settlement loop: excludes messages containing
/// "nonce" or "insufficient" (structural, non-retryable), matching the
/// generic [`X402Error::is_retryable`] classification plus the settler's
/// own phrasing.
fn is_retryable_settlement_error(error: &X402Error) -> bool {
    let message = error.to_string().to_lowercase();
    if message.contains("nonce") || message.contains("insufficient") {
        return false;
    }
    error.is_retryable() || matches!(error, X402Error::SettlementError(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_nonce_and_insufficient_from_retry() {
        assert!(!is_retryable_settlement_error(&X402Error::SettlementError(
            "nonce already used".to_string()
        )));
        assert!(!is_retryable_settlement_error(&X402Error::SettlementError(
            "insufficient balance".to_string()
        )));
    }

    #[test]
    fn retries_generic_settlement_errors() {
        assert!(is_retryable_settlement_error(&X402Error::SettlementError(
            "transaction failed: timeout".to_string()
        )));
    }
}
