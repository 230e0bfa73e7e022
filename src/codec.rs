//! Wire encoding for the `X-PAYMENT` / `X-PAYMENT-RESPONSE` headers.
//!
//! Both headers carry base64(JSON). Decoding never panics: malformed input
//! is always surfaced as a `Result`, never a panic, so the facilitator HTTP
//! surface can turn it into a `400` instead of a `500`.

use crate::errors::{Result, X402Error};
use crate::types::PaymentPayload;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a `PaymentPayload` as base64(JSON) for the `X-PAYMENT` header.
pub fn encode_payment_header(payload: &PaymentPayload) -> Result<String> {
    let json = serde_json::to_string(payload)?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Decodes a base64(JSON) `PaymentPayload` from the `X-PAYMENT` header.
pub fn decode_payment_header(encoded: &str) -> Result<PaymentPayload> {
    safe_decode(encoded)
}

/// Decodes any base64(JSON) wire value, never panicking on malformed input.
///
/// Used directly by the facilitator HTTP surface so a garbled header or
/// receipt produces a `400`/ignored value rather than propagating a panic.
pub fn safe_decode<T: DeserializeOwned>(encoded: &str) -> Result<T> {
    let decoded = BASE64
        .decode(encoded.as_bytes())
        .map_err(X402Error::Base64Error)?;
    let json_str = String::from_utf8(decoded)
        .map_err(|e| X402Error::InvalidPayload(format!("invalid UTF-8: {e}")))?;
    serde_json::from_str(&json_str).map_err(X402Error::JsonError)
}

/// Encodes any wire value as base64(JSON).
pub fn safe_encode<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Validates that a wire amount/timestamp string is a non-negative decimal
/// integer with no leading zeros (other than the literal value `"0"`), and
/// never a JSON number. §4.1/§9 require these fields stay decimal strings on
/// the wire so they round-trip exactly through uint256 without float loss.
pub fn validate_decimal_amount(value: &str) -> Result<()> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(X402Error::ValidationError(format!(
            "'{value}' is not a non-negative decimal integer string"
        )));
    }
    if value.len() > 1 && value.starts_with('0') {
        return Err(X402Error::ValidationError(format!(
            "'{value}' has a disallowed leading zero"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_payment_header() {
        let payload = PaymentPayload {
            x402_version: 1,
            scheme: "exact".to_string(),
            network: "base-mainnet".to_string(),
            payload: json!({"test": "data"}),
        };
        let encoded = encode_payment_header(&payload).unwrap();
        let decoded = decode_payment_header(&encoded).unwrap();
        assert_eq!(decoded.scheme, payload.scheme);
    }

    #[test]
    fn safe_decode_never_panics_on_garbage() {
        assert!(safe_decode::<PaymentPayload>("not valid base64!!!").is_err());
        assert!(safe_decode::<PaymentPayload>("").is_err());
    }

    #[test]
    fn validates_decimal_amounts() {
        assert!(validate_decimal_amount("0").is_ok());
        assert!(validate_decimal_amount("10000").is_ok());
        assert!(validate_decimal_amount("01000").is_err());
        assert!(validate_decimal_amount("-1").is_err());
        assert!(validate_decimal_amount("1.5").is_err());
        assert!(validate_decimal_amount("").is_err());
    }
}
