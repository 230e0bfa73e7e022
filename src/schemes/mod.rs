//! Payment scheme implementations.
//!
//! This module contains the trait definition for payment schemes and concrete
//! implementations for different blockchain networks.

pub mod exact_evm;
pub mod upto_evm;

use crate::chain;
use crate::errors::{Result, X402Error};
use crate::signer;
use crate::types::{PaymentPayload, PaymentRequirements, TransferAuthorization};
use crate::utils::{current_timestamp, parse_address, string_to_u256};
use async_trait::async_trait;
use ethers::types::{H256, U256};

/// Trait for implementing different payment schemes.
///
/// Each scheme (e.g., "exact", "upto") must implement this trait to handle
/// payload generation, verification, and settlement.
#[async_trait]
pub trait Scheme: Send + Sync {
    /// Returns the name of this scheme (e.g., "exact").
    fn name(&self) -> &str;

    /// Generates a payment payload for the given requirements.
    async fn generate_payload(
        &self,
        requirements: &PaymentRequirements,
        private_key: &str,
        rpc_url: &str,
    ) -> Result<PaymentPayload>;

    /// Verifies a payment payload against requirements.
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
        rpc_url: &str,
    ) -> Result<bool>;

    /// Settles a payment on-chain, returning the transaction hash.
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
        rpc_url: &str,
        facilitator_key: &str,
    ) -> Result<String>;
}

/// Everything extracted from a decoded authorization payload, with string
/// fields parsed into their on-chain types.
pub(crate) struct ParsedAuthorization {
    pub auth: TransferAuthorization,
    pub from: ethers::types::Address,
    pub to: ethers::types::Address,
    pub value: U256,
    pub valid_after: U256,
    pub valid_before: U256,
    pub nonce: H256,
}

pub(crate) fn parse_authorization(payload: &PaymentPayload) -> Result<ParsedAuthorization> {
    let auth: TransferAuthorization = serde_json::from_value(payload.payload.clone())
        .map_err(|e| X402Error::InvalidPayload(format!("invalid authorization: {e}")))?;

    let from = parse_address(&auth.from)?;
    let to = parse_address(&auth.to)?;
    let value = string_to_u256(&auth.value)?;
    let valid_after = string_to_u256(&auth.valid_after)?;
    let valid_before = string_to_u256(&auth.valid_before)?;

    let nonce_hex = auth.nonce.trim_start_matches("0x");
    let mut nonce_bytes = [0u8; 32];
    hex::decode_to_slice(nonce_hex, &mut nonce_bytes)
        .map_err(|e| X402Error::InvalidPayload(format!("invalid nonce: {e}")))?;

    Ok(ParsedAuthorization {
        auth,
        from,
        to,
        value,
        valid_after,
        valid_before,
        nonce: H256::from(nonce_bytes),
    })
}

/// Shared authorization-checking routine used by both `exact` and `upto`:
/// decodes the payload, checks scheme/network/recipient/timestamps, checks
/// the on-chain replay guard, and verifies the EIP-712 signature.
///
/// `expected_value` is a floor, not an exact target: an authorization signed
/// for more than `expected_value` still satisfies the requirement, it just
/// authorizes the payer to be charged up to that higher ceiling.
pub(crate) async fn verify_authorization(
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
    rpc_url: &str,
    scheme_name: &str,
    expected_value: U256,
) -> Result<bool> {
    if payload.scheme != scheme_name {
        return Ok(false);
    }
    if payload.network != requirements.network {
        return Ok(false);
    }

    let parsed = parse_authorization(payload)?;
    let expected_to = parse_address(&requirements.pay_to)?;
    let asset = parse_address(&requirements.asset)?;

    if parsed.to != expected_to {
        return Ok(false);
    }
    if parsed.value < expected_value {
        return Ok(false);
    }

    let now = U256::from(current_timestamp());
    if now < parsed.valid_after || now > parsed.valid_before {
        return Ok(false);
    }

    if chain::authorization_used(rpc_url, asset, parsed.from, parsed.nonce).await? {
        return Err(X402Error::NonceUsed(parsed.auth.nonce.clone()));
    }

    let provider = ethers::providers::Provider::<ethers::providers::Http>::try_from(rpc_url)?;
    let chain_id = ethers::providers::Middleware::get_chainid(&provider).await?;

    let (token_name, token_version) = signer::domain_name_version(requirements.extra.as_ref());
    let domain = signer::domain_separator(asset, chain_id, &token_name, &token_version);
    let message_hash = signer::authorization_hash(
        &signer::AuthorizationFields {
            from: parsed.from,
            to: parsed.to,
            value: parsed.value,
            valid_after: parsed.valid_after,
            valid_before: parsed.valid_before,
            nonce: parsed.nonce,
        },
        domain,
    );

    let recovered = signer::recover_signer(&parsed.auth.signature, message_hash)?;
    Ok(recovered == parsed.from)
}
