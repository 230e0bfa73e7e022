//! Shape and range validators for wire types.
//!
//! Used by the facilitator HTTP surface to reject malformed request bodies
//! with `400` before they reach the verifier, and by the client engine to
//! refuse signing a requirements object that doesn't pass shape checks.

use crate::errors::{Result, X402Error};
use crate::networks::Network;
use crate::types::PaymentRequirements;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid regex"))
}

fn hex32_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("valid regex"))
}

/// Validates a `0x`-prefixed 20-byte hex address.
pub fn validate_address(value: &str) -> Result<()> {
    if address_re().is_match(value) {
        Ok(())
    } else {
        Err(X402Error::ValidationError(format!(
            "'{value}' is not a well-formed address"
        )))
    }
}

/// Validates a `0x`-prefixed 32-byte hex nonce.
pub fn validate_nonce(value: &str) -> Result<()> {
    if hex32_re().is_match(value) {
        Ok(())
    } else {
        Err(X402Error::ValidationError(format!(
            "'{value}' is not a well-formed 32-byte hex nonce"
        )))
    }
}

/// Validates that `scheme` is one this build implements.
pub fn validate_scheme(scheme: &str) -> Result<()> {
    match scheme {
        "exact" | "upto" => Ok(()),
        other => Err(X402Error::UnsupportedScheme(other.to_string())),
    }
}

/// Validates that `network` is a recognized wire identifier.
pub fn validate_network(network: &str) -> Result<()> {
    if Network::from_id(network).is_some() {
        Ok(())
    } else {
        Err(X402Error::UnsupportedNetwork(network.to_string()))
    }
}

/// Validates `resource` parses as an absolute URL.
pub fn validate_resource_url(resource: &str) -> Result<()> {
    Url::parse(resource)
        .map(|_| ())
        .map_err(|e| X402Error::ValidationError(format!("invalid resource URL: {e}")))
}

/// Full shape validation of a `PaymentRequirements` object, run before the
/// client signs against it and before the facilitator accepts it.
pub fn validate_requirements(requirements: &PaymentRequirements) -> Result<()> {
    validate_scheme(&requirements.scheme)?;
    validate_network(&requirements.network)?;
    validate_address(&requirements.pay_to)?;
    validate_address(&requirements.asset)?;
    crate::codec::validate_decimal_amount(&requirements.max_amount_required)?;
    validate_resource_url(&requirements.resource)?;
    if requirements.max_timeout_seconds == 0 {
        return Err(X402Error::ValidationError(
            "maxTimeoutSeconds must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_addresses() {
        assert!(validate_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").is_ok());
        assert!(validate_address("0xshort").is_err());
        assert!(validate_address("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").is_err());
    }

    #[test]
    fn validates_nonces() {
        let nonce = format!("0x{}", "ab".repeat(32));
        assert!(validate_nonce(&nonce).is_ok());
        assert!(validate_nonce("0xabc").is_err());
    }

    #[test]
    fn validates_scheme_and_network() {
        assert!(validate_scheme("exact").is_ok());
        assert!(validate_scheme("upto").is_ok());
        assert!(validate_scheme("other").is_err());
        assert!(validate_network("base-mainnet").is_ok());
        assert!(validate_network("solana-mainnet").is_err());
    }

    #[test]
    fn validates_resource_urls() {
        assert!(validate_resource_url("https://api.example.com/weather").is_ok());
        assert!(validate_resource_url("not a url").is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let requirements = PaymentRequirements {
            scheme: "exact".to_string(),
            network: "base-mainnet".to_string(),
            max_amount_required: "10000".to_string(),
            resource: "https://api.example.com/weather".to_string(),
            description: None,
            mime_type: None,
            output_schema: None,
            pay_to: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            max_timeout_seconds: 0,
            asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            extra: None,
        };
        assert!(validate_requirements(&requirements).is_err());
    }
}
