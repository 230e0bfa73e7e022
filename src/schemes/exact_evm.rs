//! Implementation of the "exact" payment scheme for EVM-compatible chains.
//!
//! Uses EIP-3009 `transferWithAuthorization` for gasless ERC-20 transfers:
//! the payer signs an authorization that lets the facilitator execute the
//! transfer on their behalf without the payer holding ETH for gas.

use crate::chain::{self, TransferAuthorizationCall};
use crate::errors::{Result, X402Error};
use crate::schemes::{parse_authorization, verify_authorization, Scheme};
use crate::signer;
use crate::types::{PaymentPayload, PaymentRequirements, TransferAuthorization, X402_VERSION};
use crate::utils::{current_timestamp, generate_nonce, parse_address, string_to_u256};
use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::H256;
use serde_json::json;

/// Implementation of the "exact" scheme for EVM chains.
///
/// Requires the payer to authorize exactly `maxAmountRequired` via a signed
/// EIP-3009 authorization.
#[derive(Default)]
pub struct ExactEvm;

impl ExactEvm {
    /// Creates a new instance of the ExactEvm scheme.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Scheme for ExactEvm {
    fn name(&self) -> &str {
        "exact"
    }

    async fn generate_payload(
        &self,
        requirements: &PaymentRequirements,
        private_key: &str,
        rpc_url: &str,
    ) -> Result<PaymentPayload> {
        let to = parse_address(&requirements.pay_to)?;
        let value = string_to_u256(&requirements.max_amount_required)?;
        let asset = parse_address(&requirements.asset)?;

        let wallet = private_key
            .parse::<LocalWallet>()
            .map_err(|e| X402Error::InvalidPayload(format!("invalid private key: {e}")))?;
        let from = wallet.address();

        let provider = ethers::providers::Provider::<ethers::providers::Http>::try_from(rpc_url)?;
        let chain_id = provider.get_chainid().await?;

        let nonce_bytes: [u8; 32] = {
            let nonce_str = generate_nonce();
            let nonce_hex = nonce_str.trim_start_matches("0x");
            let mut bytes = [0u8; 32];
            hex::decode_to_slice(nonce_hex, &mut bytes)
                .map_err(|e| X402Error::InvalidPayload(format!("invalid nonce: {e}")))?;
            bytes
        };
        let nonce = H256::from(nonce_bytes);

        let now = current_timestamp();
        let valid_after = ethers::types::U256::from(now);
        let valid_before = ethers::types::U256::from(now + requirements.max_timeout_seconds);

        let (token_name, token_version) = signer::domain_name_version(requirements.extra.as_ref());
        let domain = signer::domain_separator(asset, chain_id, &token_name, &token_version);
        let message_hash = signer::authorization_hash(
            &signer::AuthorizationFields {
                from,
                to,
                value,
                valid_after,
                valid_before,
                nonce,
            },
            domain,
        );

        let signature = wallet
            .sign_hash(message_hash)
            .map_err(|e| X402Error::SignatureError(e.to_string()))?;

        let mut r_bytes = [0u8; 32];
        signature.r.to_big_endian(&mut r_bytes);
        let mut s_bytes = [0u8; 32];
        signature.s.to_big_endian(&mut s_bytes);

        let mut sig_bytes = Vec::with_capacity(65);
        sig_bytes.extend_from_slice(&r_bytes);
        sig_bytes.extend_from_slice(&s_bytes);
        sig_bytes.push(signer::normalize_v(signature.v as u8));

        let authorization = TransferAuthorization {
            from: format!("{from:?}"),
            to: format!("{to:?}"),
            value: value.to_string(),
            valid_after: valid_after.to_string(),
            valid_before: valid_before.to_string(),
            nonce: format!("0x{}", hex::encode(nonce_bytes)),
            signature: format!("0x{}", hex::encode(sig_bytes)),
        };

        Ok(PaymentPayload {
            x402_version: X402_VERSION,
            scheme: self.name().to_string(),
            network: requirements.network.clone(),
            payload: json!(authorization),
        })
    }

    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
        rpc_url: &str,
    ) -> Result<bool> {
        let expected_value = string_to_u256(&requirements.max_amount_required)?;
        verify_authorization(payload, requirements, rpc_url, self.name(), expected_value).await
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
        rpc_url: &str,
        facilitator_key: &str,
    ) -> Result<String> {
        let parsed = parse_authorization(payload)?;
        let asset = parse_address(&requirements.asset)?;
        let (v, r, s) = signer::split_signature_for_submission(&parsed.auth.signature)?;

        let call = TransferAuthorizationCall {
            token: asset,
            from: parsed.from,
            to: parsed.to,
            value: parsed.value,
            valid_after: parsed.valid_after,
            valid_before: parsed.valid_before,
            nonce: parsed.nonce,
            v,
            r,
            s,
        };

        chain::simulate(rpc_url, &call).await?;
        let receipt = chain::submit_transfer_with_authorization(rpc_url, facilitator_key, call).await?;
        Ok(format!("{:?}", receipt.tx_hash))
    }
}
