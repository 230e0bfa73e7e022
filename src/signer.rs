//! EIP-712 signing primitives for EIP-3009 `transferWithAuthorization`.
//!
//! Shared by every EVM scheme (`exact`, `upto`) so the domain separator and
//! struct hash are computed identically regardless of which scheme is
//! signing or verifying.

use crate::errors::{Result, X402Error};
use ethers::abi::Token;
use ethers::core::utils::keccak256;
use ethers::types::{Address, Signature, H256, U256};

/// Default EIP-712 domain name used when a requirement's `extra` doesn't
/// override it (matches USDC's own domain).
pub const DEFAULT_DOMAIN_NAME: &str = "USD Coin";
/// Default EIP-712 domain version.
pub const DEFAULT_DOMAIN_VERSION: &str = "2";

/// The full set of fields in an EIP-3009 `TransferWithAuthorization` struct.
pub struct AuthorizationFields {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub valid_after: U256,
    pub valid_before: U256,
    pub nonce: H256,
}

/// Computes the EIP-712 domain separator for a token contract.
pub fn domain_separator(token_address: Address, chain_id: U256, name: &str, version: &str) -> H256 {
    let type_hash = keccak256(
        b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
    );

    H256::from(keccak256(&ethers::abi::encode(&[
        Token::FixedBytes(type_hash.to_vec()),
        Token::FixedBytes(keccak256(name.as_bytes()).to_vec()),
        Token::FixedBytes(keccak256(version.as_bytes()).to_vec()),
        Token::Uint(chain_id),
        Token::Address(token_address),
    ])))
}

/// Computes the EIP-712 signing hash for a `TransferWithAuthorization` message.
pub fn authorization_hash(fields: &AuthorizationFields, domain_separator: H256) -> H256 {
    let type_hash = keccak256(
        b"TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)",
    );

    let struct_hash = keccak256(&ethers::abi::encode(&[
        Token::FixedBytes(type_hash.to_vec()),
        Token::Address(fields.from),
        Token::Address(fields.to),
        Token::Uint(fields.value),
        Token::Uint(fields.valid_after),
        Token::Uint(fields.valid_before),
        Token::FixedBytes(fields.nonce.as_bytes().to_vec()),
    ]));

    let mut message = Vec::with_capacity(2 + 32 + 32);
    message.extend_from_slice(b"\x19\x01");
    message.extend_from_slice(domain_separator.as_bytes());
    message.extend_from_slice(&struct_hash);

    H256::from(keccak256(&message))
}

/// Resolves the EIP-712 domain name/version from a requirement's `extra`
/// field, falling back to the stablecoin defaults.
pub fn domain_name_version(extra: Option<&serde_json::Value>) -> (String, String) {
    let name = extra
        .and_then(|e| e.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_DOMAIN_NAME)
        .to_string();
    let version = extra
        .and_then(|e| e.get("version"))
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_DOMAIN_VERSION)
        .to_string();
    (name, version)
}

/// Splits a 65-byte `0x`-prefixed hex signature into `(v, r, s)`, normalizing
/// `v` to `{27, 28}` as required before submission on-chain.
pub fn split_signature_for_submission(signature_hex: &str) -> Result<(u8, H256, H256)> {
    let sig_hex = signature_hex.trim_start_matches("0x");
    let bytes = hex::decode(sig_hex)
        .map_err(|e| X402Error::SignatureError(format!("invalid signature hex: {e}")))?;
    if bytes.len() != 65 {
        return Err(X402Error::SignatureError(format!(
            "signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }
    let r = H256::from_slice(&bytes[0..32]);
    let s = H256::from_slice(&bytes[32..64]);
    let v = normalize_v(bytes[64]);
    Ok((v, r, s))
}

/// Normalizes a recovery id to the `{27, 28}` convention accepted by
/// `transferWithAuthorization`. Accepts `{0, 1}` or `{27, 28}` as input.
pub fn normalize_v(v: u8) -> u8 {
    match v {
        0 | 1 => v + 27,
        27 | 28 => v,
        other => other,
    }
}

/// Recovers the signer address from a 65-byte hex signature and message hash.
pub fn recover_signer(signature_hex: &str, message_hash: H256) -> Result<Address> {
    let sig_hex = signature_hex.trim_start_matches("0x");
    if sig_hex.len() != 130 {
        return Err(X402Error::SignatureError(
            "signature must be 65 bytes (130 hex chars)".to_string(),
        ));
    }
    let bytes = hex::decode(sig_hex)
        .map_err(|e| X402Error::SignatureError(format!("invalid signature hex: {e}")))?;
    let signature = Signature::try_from(bytes.as_slice())
        .map_err(|e| X402Error::SignatureError(e.to_string()))?;
    Ok(signature.recover(message_hash)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_separator_is_deterministic() {
        let token: Address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".parse().unwrap();
        let a = domain_separator(token, U256::from(8453u64), "USD Coin", "2");
        let b = domain_separator(token, U256::from(8453u64), "USD Coin", "2");
        assert_eq!(a, b);
        assert_ne!(a, H256::zero());
    }

    #[test]
    fn v_normalization_accepts_both_conventions() {
        assert_eq!(normalize_v(0), 27);
        assert_eq!(normalize_v(1), 28);
        assert_eq!(normalize_v(27), 27);
        assert_eq!(normalize_v(28), 28);
    }

    #[test]
    fn domain_name_version_falls_back_to_stablecoin_defaults() {
        let (name, version) = domain_name_version(None);
        assert_eq!(name, DEFAULT_DOMAIN_NAME);
        assert_eq!(version, DEFAULT_DOMAIN_VERSION);
    }

    #[test]
    fn domain_name_version_prefers_extra() {
        let extra = serde_json::json!({"name": "MyToken", "version": "1"});
        let (name, version) = domain_name_version(Some(&extra));
        assert_eq!(name, "MyToken");
        assert_eq!(version, "1");
    }

    #[test]
    fn split_signature_rejects_wrong_length() {
        let err = split_signature_for_submission("0x1234").unwrap_err();
        assert!(matches!(err, X402Error::SignatureError(_)));
    }
}
