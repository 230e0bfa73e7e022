//! Resource-server gateway: middleware that gates a route behind payment,
//! delegating verification/settlement to a facilitator over HTTP.
//!
//! Distinct from [`crate::facilitator`] (which *is* a facilitator) — this
//! module is the client-side-of-the-facilitator counterpart that a resource
//! server embeds in front of its own handlers.

use crate::errors::{Result, X402Error};
use crate::types::{
    PaymentRequiredResponse, PaymentRequirements, SettlementRequest, SettlementResponse,
    VerificationRequest, VerificationResponse,
};
use crate::utils::dollar_to_token_amount;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;

/// An additional (asset, network, scheme) a route accepts payment through,
/// alongside its primary requirement. Same price, same recipient — only the
/// asset/network/scheme (and that asset's token metadata) differ.
#[derive(Clone, Debug)]
pub struct AltRequirement {
    pub asset: String,
    pub decimals: u8,
    pub network: String,
    pub scheme: String,
    pub token_name: Option<String>,
    pub token_version: Option<String>,
}

/// Configuration for a single gated route.
#[derive(Clone, Debug)]
pub struct RouteConfig {
    pub pay_to: String,
    pub asset: String,
    pub decimals: u8,
    pub network: String,
    pub scheme: String,
    pub price_usd: f64,
    pub description: String,
    pub facilitator_url: String,
    pub max_timeout_seconds: u64,
    pub token_name: Option<String>,
    pub token_version: Option<String>,
    /// If `true`, the gateway calls `/settle` and attaches the receipt
    /// before letting the request through; if `false`, it only calls
    /// `/verify` and the caller settles separately.
    pub settle_then_respond: bool,
    /// Other (asset, network, scheme) combinations this route also accepts,
    /// listed alongside the primary requirement in `accepts[]` on a `402`.
    pub alternatives: Vec<AltRequirement>,
}

impl RouteConfig {
    pub fn new(
        pay_to: impl Into<String>,
        asset: impl Into<String>,
        decimals: u8,
        network: impl Into<String>,
        scheme: impl Into<String>,
        price_usd: f64,
        description: impl Into<String>,
        facilitator_url: impl Into<String>,
    ) -> Self {
        Self {
            pay_to: pay_to.into(),
            asset: asset.into(),
            decimals,
            network: network.into(),
            scheme: scheme.into(),
            price_usd,
            description: description.into(),
            facilitator_url: facilitator_url.into(),
            max_timeout_seconds: 300,
            token_name: None,
            token_version: None,
            settle_then_respond: true,
            alternatives: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    pub fn with_token_metadata(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.token_name = Some(name.into());
        self.token_version = Some(version.into());
        self
    }

    pub fn verify_only(mut self) -> Self {
        self.settle_then_respond = false;
        self
    }

    /// Adds another (asset, network, scheme) this route accepts payment
    /// through, listed alongside the primary requirement in `accepts[]`.
    pub fn with_alternative(mut self, alt: AltRequirement) -> Self {
        self.alternatives.push(alt);
        self
    }

    fn build_requirements(
        &self,
        resource: &str,
        asset: &str,
        decimals: u8,
        network: &str,
        scheme: &str,
        token_name: Option<&str>,
        token_version: Option<&str>,
    ) -> Result<PaymentRequirements> {
        let amount_str = dollar_to_token_amount(self.price_usd, decimals, 1.0)?;

        let mut extra = json!({});
        if let Some(name) = token_name {
            extra["name"] = json!(name);
        }
        if let Some(version) = token_version {
            extra["version"] = json!(version);
        }

        Ok(PaymentRequirements {
            scheme: scheme.to_string(),
            network: network.to_string(),
            max_amount_required: amount_str,
            resource: resource.to_string(),
            description: Some(self.description.clone()),
            mime_type: Some("application/json".to_string()),
            output_schema: None,
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: asset.to_string(),
            extra: if extra.as_object().unwrap().is_empty() {
                None
            } else {
                Some(extra)
            },
        })
    }

    /// Builds the route's primary `PaymentRequirements`.
    pub fn to_requirements(&self, resource: &str) -> Result<PaymentRequirements> {
        self.build_requirements(
            resource,
            &self.asset,
            self.decimals,
            &self.network,
            &self.scheme,
            self.token_name.as_deref(),
            self.token_version.as_deref(),
        )
    }

    /// Builds every `PaymentRequirements` this route accepts: the primary
    /// one first, followed by each configured alternative.
    pub fn to_all_requirements(&self, resource: &str) -> Result<Vec<PaymentRequirements>> {
        let mut all = vec![self.to_requirements(resource)?];
        for alt in &self.alternatives {
            all.push(self.build_requirements(
                resource,
                &alt.asset,
                alt.decimals,
                &alt.network,
                &alt.scheme,
                alt.token_name.as_deref(),
                alt.token_version.as_deref(),
            )?);
        }
        Ok(all)
    }
}

/// Outcome of gating a single request.
pub enum GateResult {
    /// No `X-PAYMENT` header present; respond with `402` using this body.
    PaymentRequired(PaymentRequiredResponse),
    /// Payment was rejected; respond with `400` and this reason.
    Rejected(String),
    /// Payment passed; the request may proceed. Carries the settlement
    /// receipt if `settle_then_respond` was set: `tx_hash` for callers that
    /// just need the hash, `payment_response_header` as the ready-to-attach
    /// base64(JSON) `X-PAYMENT-RESPONSE` value.
    Allowed {
        tx_hash: Option<String>,
        payment_response_header: Option<String>,
    },
}

/// Callback invoked exactly once per successful gate.
pub type OnPayment<'a> = dyn Fn(&RouteConfig, Option<&str>) + Send + Sync + 'a;

/// Gates a single request against `route`, given the (optional) `X-PAYMENT`
/// header value and the resource path being requested.
pub async fn gate(
    client: &Client,
    route: &RouteConfig,
    resource: &str,
    payment_header: Option<&str>,
    on_payment: Option<&OnPayment<'_>>,
) -> Result<GateResult> {
    let accepts = route.to_all_requirements(resource)?;

    let Some(payment_header) = payment_header else {
        return Ok(GateResult::PaymentRequired(PaymentRequiredResponse {
            x402_version: crate::types::X402_VERSION,
            accepts,
            error: Some("Payment required".to_string()),
        }));
    };

    let payload = crate::codec::decode_payment_header(payment_header)?;
    let Some(requirements) = accepts
        .into_iter()
        .find(|r| r.scheme == payload.scheme && r.network == payload.network)
    else {
        return Ok(GateResult::Rejected(format!(
            "no accepted requirement matches scheme/network {}/{}",
            payload.scheme, payload.network
        )));
    };

    if route.settle_then_respond {
        let settlement = call_settle(client, route, payment_header, &requirements).await?;
        if let Some(error) = settlement.error {
            return Ok(GateResult::Rejected(error));
        }
        if let Some(cb) = on_payment {
            cb(route, Some(&settlement.tx_hash));
        }
        let receipt = crate::types::PaymentResponse {
            success: settlement.success,
            tx_hash: settlement.tx_hash.clone(),
            network_id: settlement.network_id.clone(),
            actual_amount: settlement.actual_amount.clone(),
            settled_at: None,
            metadata: None,
        };
        Ok(GateResult::Allowed {
            tx_hash: Some(settlement.tx_hash),
            payment_response_header: crate::codec::safe_encode(&receipt).ok(),
        })
    } else {
        let verification = call_verify(client, route, payment_header, &requirements).await?;
        if !verification.is_valid {
            return Ok(GateResult::Rejected(
                verification.invalid_reason.unwrap_or_else(|| "verification failed".to_string()),
            ));
        }
        if let Some(cb) = on_payment {
            cb(route, None);
        }
        Ok(GateResult::Allowed {
            tx_hash: None,
            payment_response_header: None,
        })
    }
}

async fn call_verify(
    client: &Client,
    route: &RouteConfig,
    payment_header: &str,
    requirements: &PaymentRequirements,
) -> Result<VerificationResponse> {
    let request = VerificationRequest {
        payment_header: payment_header.to_string(),
        payment_requirements: requirements.clone(),
    };
    let url = format!("{}/verify", route.facilitator_url);
    let response = client.post(&url).json(&request).send().await?;
    if !response.status().is_success() {
        return Err(X402Error::FacilitatorError {
            status: response.status().as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response.json().await?)
}

async fn call_settle(
    client: &Client,
    route: &RouteConfig,
    payment_header: &str,
    requirements: &PaymentRequirements,
) -> Result<SettlementResponse> {
    let request = SettlementRequest {
        payment_header: payment_header.to_string(),
        payment_requirements: requirements.clone(),
    };
    let url = format!("{}/settle", route.facilitator_url);
    let response = client.post(&url).json(&request).send().await?;
    if !response.status().is_success() {
        return Err(X402Error::FacilitatorError {
            status: response.status().as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response.json().await?)
}

/// Helper to create a simple single-route config defaulting to Base
/// mainnet USDC.
pub fn simple_route(pay_to: &str, price_usd: f64, description: &str, facilitator_url: &str) -> RouteConfig {
    RouteConfig::new(
        pay_to,
        crate::networks::Network::BaseMainnet.info().usdc_address,
        6,
        crate::networks::Network::BaseMainnet.as_id(),
        "exact",
        price_usd,
        description,
        facilitator_url,
    )
    .with_token_metadata("USD Coin", "2")
}

/// Threads the shared facilitator HTTP client + route map a gateway uses
/// across many resources, so each request doesn't build its own client.
pub struct Gateway {
    pub client: Client,
    pub routes: std::collections::HashMap<String, RouteConfig>,
    pub on_payment: Option<Arc<OnPayment<'static>>>,
}

impl Gateway {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            routes: std::collections::HashMap::new(),
            on_payment: None,
        }
    }

    pub fn with_route(mut self, path: impl Into<String>, route: RouteConfig) -> Self {
        self.routes.insert(path.into(), route);
        self
    }

    pub async fn gate(&self, path: &str, payment_header: Option<&str>) -> Result<GateResult> {
        let route = self
            .routes
            .get(path)
            .ok_or_else(|| X402Error::Other(format!("no route configured for {path}")))?;
        let callback = self.on_payment.as_deref();
        gate(&self.client, route, path, payment_header, callback).await
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_config_creation() {
        let route = RouteConfig::new(
            "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb",
            "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            6,
            "base-mainnet",
            "exact",
            0.01,
            "Test payment",
            "https://facilitator.test",
        );
        assert_eq!(route.price_usd, 0.01);
        assert!(route.settle_then_respond);
    }

    #[test]
    fn test_to_requirements() {
        let route = RouteConfig::new(
            "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb",
            "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            6,
            "base-mainnet",
            "exact",
            0.01,
            "Test payment",
            "https://facilitator.test",
        );
        let requirements = route.to_requirements("/api/test").unwrap();
        assert_eq!(requirements.scheme, "exact");
        assert_eq!(requirements.max_amount_required, "10000");
    }

    #[tokio::test]
    async fn gate_without_header_returns_402_body() {
        let route = RouteConfig::new(
            "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb",
            "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            6,
            "base-mainnet",
            "exact",
            0.01,
            "Test",
            "https://facilitator.test",
        );
        let client = Client::new();
        let result = gate(&client, &route, "/api/test", None, None).await.unwrap();
        match result {
            GateResult::PaymentRequired(response) => {
                assert_eq!(response.accepts.len(), 1);
                assert_eq!(response.error.as_deref(), Some("Payment required"));
            }
            _ => panic!("expected PaymentRequired"),
        }
    }

    #[tokio::test]
    async fn gate_lists_all_alternatives_in_accepts() {
        let route = RouteConfig::new(
            "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb",
            "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            6,
            "base-mainnet",
            "exact",
            0.01,
            "Test",
            "https://facilitator.test",
        )
        .with_alternative(AltRequirement {
            asset: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831".to_string(),
            decimals: 6,
            network: "arbitrum-one".to_string(),
            scheme: "exact".to_string(),
            token_name: Some("USD Coin".to_string()),
            token_version: Some("2".to_string()),
        });
        let client = Client::new();
        let result = gate(&client, &route, "/api/test", None, None).await.unwrap();
        match result {
            GateResult::PaymentRequired(response) => {
                assert_eq!(response.accepts.len(), 2);
                assert_eq!(response.accepts[1].network, "arbitrum-one");
            }
            _ => panic!("expected PaymentRequired"),
        }
    }
}
