//! Facilitator-side payment verification pipeline.
//!
//! Runs the documented step sequence: decode → version/scheme/network check
//! → nonce lookup → recipient/amount/timestamp/signature checks (delegated
//! to the scheme) → balance check (soft-fail) → record nonce.

use crate::chain;
use crate::codec;
use crate::errors::X402Error;
use crate::metrics::Metrics;
use crate::nonce_cache::NonceCache;
use crate::schemes::{exact_evm::ExactEvm, upto_evm::UptoEvm, Scheme};
use crate::types::{TransferAuthorization, VerificationRequest, VerificationResponse, X402_VERSION};
use crate::utils::parse_address;
use crate::validation;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Dependencies the verifier needs, held by the facilitator for its lifetime.
pub struct Verifier {
    pub rpc_url: String,
    pub nonce_cache: Arc<NonceCache>,
    pub metrics: Arc<Metrics>,
}

impl Verifier {
    pub fn new(rpc_url: impl Into<String>, nonce_cache: Arc<NonceCache>, metrics: Arc<Metrics>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            nonce_cache,
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

    /// Runs the full verification sequence and records metrics.
    pub async fn verify(&self, request: &VerificationRequest) -> VerificationResponse {
        let start = Instant::now();
        let response = self.verify_inner(request).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        self.metrics.record_verify(response.is_valid, latency_ms);
        debug!(is_valid = response.is_valid, latency_ms, "verification complete");
        response
    }

    async fn verify_inner(&self, request: &VerificationRequest) -> VerificationResponse {
        macro_rules! invalid {
            ($reason:expr) => {
                return VerificationResponse {
                    is_valid: false,
                    invalid_reason: Some($reason),
                }
            };
        }

        // 1. decode
        let payload = match codec::decode_payment_header(&request.payment_header) {
            Ok(p) => p,
            Err(e) => invalid!(format!("invalid payment header: {e}")),
        };

        // 2. version/scheme/network check
        if payload.x402_version != X402_VERSION {
            invalid!(format!("unsupported x402 version: {}", payload.x402_version));
        }
        if let Err(e) = validation::validate_requirements(&request.payment_requirements) {
            invalid!(e.to_string());
        }
        if payload.scheme != request.payment_requirements.scheme {
            invalid!("payload scheme does not match requirements".to_string());
        }
        if payload.network != request.payment_requirements.network {
            invalid!("payload network does not match requirements".to_string());
        }

        let Some(scheme) = self.scheme_for(&payload.scheme) else {
            invalid!(format!("unsupported scheme: {}", payload.scheme));
        };

        // 3. nonce lookup (latency optimization ahead of the on-chain check)
        let auth: Option<TransferAuthorization> =
            serde_json::from_value(payload.payload.clone()).ok();
        if let Some(auth) = &auth {
            if self.nonce_cache.contains(&payload.network, &auth.nonce) {
                self.metrics.record_replay_blocked();
                invalid!(format!("nonce already used (replay detected): {}", auth.nonce));
            }
        }

        // 4-7: recipient/amount/timestamp/signature, delegated to the scheme,
        // which also performs the authoritative on-chain replay check.
        match scheme
            .verify(&payload, &request.payment_requirements, &self.rpc_url)
            .await
        {
            Ok(true) => {}
            Ok(false) => invalid!("signature or requirement mismatch".to_string()),
            Err(X402Error::NonceUsed(nonce)) => {
                self.metrics.record_replay_blocked();
                invalid!(format!("nonce already used (replay detected): {nonce}"));
            }
            Err(e) => invalid!(e.to_string()),
        }

        // 8. balance check — a successful read below the requirement fails
        // verification; an RPC failure to read the balance is soft (logged,
        // never blocks verification) since it says nothing about the payer.
        if let Some(auth) = &auth {
            if let (Ok(asset), Ok(from)) = (
                parse_address(&request.payment_requirements.asset),
                parse_address(&auth.from),
            ) {
                match chain::balance_of(&self.rpc_url, asset, from).await {
                    Ok(balance) => {
                        if let Ok(required) =
                            crate::utils::string_to_u256(&request.payment_requirements.max_amount_required)
                        {
                            if balance < required {
                                invalid!("insufficient balance".to_string());
                            }
                        }
                    }
                    Err(e) => debug!(error = %e, "balance check failed; proceeding (soft check)"),
                }
            }
        }

        // 9. record nonce
        if let Some(auth) = &auth {
            self.nonce_cache.record(&payload.network, &auth.nonce);
        }

        VerificationResponse {
            is_valid: true,
            invalid_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentRequirements;

    fn sample_requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: "base-mainnet".to_string(),
            max_amount_required: "10000".to_string(),
            resource: "https://api.example.com/weather".to_string(),
            description: None,
            mime_type: None,
            output_schema: None,
            pay_to: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            max_timeout_seconds: 300,
            asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            extra: None,
        }
    }

    #[tokio::test]
    async fn rejects_garbage_payment_header() {
        let verifier = Verifier::new(
            "https://mainnet.base.org",
            Arc::new(NonceCache::new()),
            Arc::new(Metrics::new()),
        );
        let request = VerificationRequest {
            payment_header: "not valid base64!!".to_string(),
            payment_requirements: sample_requirements(),
        };
        let response = verifier.verify(&request).await;
        assert!(!response.is_valid);
        assert!(response.invalid_reason.unwrap().contains("invalid payment header"));
    }

    #[tokio::test]
    async fn rejects_mismatched_requirements_shape() {
        let verifier = Verifier::new(
            "https://mainnet.base.org",
            Arc::new(NonceCache::new()),
            Arc::new(Metrics::new()),
        );
        let mut requirements = sample_requirements();
        requirements.max_timeout_seconds = 0;
        let payload = crate::types::PaymentPayload {
            x402_version: X402_VERSION,
            scheme: "exact".to_string(),
            network: "base-mainnet".to_string(),
            payload: serde_json::json!({}),
        };
        let header = codec::encode_payment_header(&payload).unwrap();
        let request = VerificationRequest {
            payment_header: header,
            payment_requirements: requirements,
        };
        let response = verifier.verify(&request).await;
        assert!(!response.is_valid);
    }
}
