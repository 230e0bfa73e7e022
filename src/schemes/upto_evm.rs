//! Implementation of the "upto" payment scheme for EVM-compatible chains.
//!
//! Shares its authorization checking and on-chain settlement with `exact`
//! ([`verify_authorization`], [`chain::simulate`]/[`chain::submit_transfer_with_authorization`]):
//! the payer signs a single EIP-3009 authorization for the requirement's
//! `maxAmountRequired`, and the resource server later tells the facilitator
//! how much of that ceiling to actually charge.

use crate::chain::{self, TransferAuthorizationCall};
use crate::errors::{Result, X402Error};
use crate::schemes::exact_evm::ExactEvm;
use crate::schemes::{parse_authorization, verify_authorization, Scheme};
use crate::signer;
use crate::utils::{parse_address, string_to_u256};
use async_trait::async_trait;
use ethers::types::U256;

/// The "upto" scheme: the payer authorizes a ceiling, the resource server
/// settles for the actual metered amount (defaulting to the ceiling).
///
/// `transferWithAuthorization` moves exactly the value baked into the
/// signed authorization — there is no on-chain partial-transfer primitive,
/// so settlement still broadcasts the full authorized `value`. The metered
/// `actual_amount` set here only gates what the facilitator is willing to
/// report/accept as the charge; see the open-question resolution in
/// DESIGN.md.
pub struct UptoEvm {
    actual_amount: Option<String>,
}

impl UptoEvm {
    /// Creates an UptoEvm scheme that settles for `maxAmountRequired`.
    pub fn new() -> Self {
        Self { actual_amount: None }
    }

    /// Sets the metered amount to actually charge; must be `<=` the
    /// authorization's signed `value`.
    pub fn with_actual_amount(mut self, actual_amount: impl Into<String>) -> Self {
        self.actual_amount = Some(actual_amount.into());
        self
    }
}

impl Default for UptoEvm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheme for UptoEvm {
    fn name(&self) -> &str {
        "upto"
    }

    async fn generate_payload(
        &self,
        requirements: &crate::types::PaymentRequirements,
        private_key: &str,
        rpc_url: &str,
    ) -> Result<crate::types::PaymentPayload> {
        // Signing is identical to `exact`: the payer authorizes the ceiling.
        let mut payload = ExactEvm::new()
            .generate_payload(requirements, private_key, rpc_url)
            .await?;
        payload.scheme = self.name().to_string();
        Ok(payload)
    }

    async fn verify(
        &self,
        payload: &crate::types::PaymentPayload,
        requirements: &crate::types::PaymentRequirements,
        rpc_url: &str,
    ) -> Result<bool> {
        let expected_value = string_to_u256(&requirements.max_amount_required)?;
        verify_authorization(payload, requirements, rpc_url, self.name(), expected_value).await
    }

    async fn settle(
        &self,
        payload: &crate::types::PaymentPayload,
        requirements: &crate::types::PaymentRequirements,
        rpc_url: &str,
        facilitator_key: &str,
    ) -> Result<String> {
        let parsed = parse_authorization(payload)?;
        let asset = parse_address(&requirements.asset)?;

        let actual_amount = match &self.actual_amount {
            Some(amount) => string_to_u256(amount)?,
            None => string_to_u256(&requirements.max_amount_required)?,
        };

        if actual_amount > parsed.value {
            return Err(X402Error::ValidationError(
                "charge amount exceeds authorized max".to_string(),
            ));
        }

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

/// Validates `actual_amount <= authorized max` without touching the chain;
/// exposed for the verifier/settler to pre-check before constructing an
/// [`UptoEvm`].
pub fn check_actual_amount(actual_amount: &str, authorized_max: &str) -> Result<U256> {
    let actual = string_to_u256(actual_amount)?;
    let max = string_to_u256(authorized_max)?;
    if actual > max {
        return Err(X402Error::ValidationError(
            "charge amount exceeds authorized max".to_string(),
        ));
    }
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upto_scheme_name_is_upto() {
        assert_eq!(UptoEvm::new().name(), "upto");
    }

    #[test]
    fn check_actual_amount_rejects_over_ceiling() {
        let err = check_actual_amount("20000", "10000").unwrap_err();
        assert!(matches!(err, X402Error::ValidationError(_)));
    }

    #[test]
    fn check_actual_amount_accepts_at_or_under_ceiling() {
        assert!(check_actual_amount("10000", "10000").is_ok());
        assert!(check_actual_amount("5000", "10000").is_ok());
    }
}
