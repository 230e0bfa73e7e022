//! Client-side functionality for the x402 protocol.
//!
//! Wraps outbound HTTP requests with automatic 402-handling: option
//! selection, an optional payment-decision callback, signing, retrying with
//! `X-PAYMENT`, and parsing the settlement receipt back out of
//! `X-PAYMENT-RESPONSE`. Wrapped per-host in a [`CircuitBreaker`] and
//! [`RetryPolicy`].

use crate::codec::{decode_payment_header, encode_payment_header};
use crate::errors::{Result, X402Error};
use crate::events::{EventBus, EventKind};
use crate::networks::Network;
use crate::nonce_cache::SelfNonceSet;
use crate::resilience::{CircuitBreaker, RetryPolicy};
use crate::schemes::{exact_evm::ExactEvm, upto_evm::UptoEvm, Scheme};
use crate::types::{PaymentPayload, PaymentRequiredResponse, PaymentRequirements};
use crate::validation::validate_requirements;
use dashmap::DashMap;
use futures_util::Stream;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const STREAMING_TIMEOUT_MULTIPLIER: u32 = 3;

/// Result of a completed payment-aware request.
pub struct PaidResponse {
    pub response: Response,
    pub paid: bool,
    pub tx_hash: Option<String>,
}

/// Configuration for x402 client requests.
#[derive(Clone)]
pub struct X402ClientConfig {
    pub private_key: String,
    pub rpc_url: String,
    pub http_client: Client,
    pub preferred_scheme: Option<String>,
    pub preferred_network: Option<String>,
    /// Hard ceiling on what this client will pay for any single request.
    pub max_amount: Option<String>,
    pub timeout: Duration,
    /// Shared across requests; tracks host → breaker so repeated calls to
    /// the same resource server reuse the circuit state.
    breakers: Arc<DashMap<String, Arc<CircuitBreaker>>>,
    retry_policy: RetryPolicy,
    self_nonces: Arc<SelfNonceSet>,
    events: Arc<EventBus>,
}

impl X402ClientConfig {
    pub fn new(private_key: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            rpc_url: rpc_url.into(),
            http_client: Client::new(),
            preferred_scheme: Some("exact".to_string()),
            preferred_network: None,
            max_amount: None,
            timeout: DEFAULT_TIMEOUT,
            breakers: Arc::new(DashMap::new()),
            retry_policy: RetryPolicy::default(),
            self_nonces: Arc::new(SelfNonceSet::new()),
            events: Arc::new(EventBus::new()),
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.preferred_scheme = Some(scheme.into());
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.preferred_network = Some(network.into());
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// Sets a hard ceiling on the amount this client will pay per request;
    /// exceeding it terminates the pipeline with [`X402Error::PriceExceedsMax`].
    pub fn with_max_amount(mut self, max_amount: impl Into<String>) -> Self {
        self.max_amount = Some(max_amount.into());
        self
    }

    /// Shares an external event bus instead of this config's private one,
    /// so a process-wide listener sees every client's events.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn breaker_for_host(&self, host: &str) -> Arc<CircuitBreaker> {
        Arc::clone(
            self.breakers
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(5, 2, Duration::from_secs(30))))
                .value(),
        )
    }
}

fn host_of(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)?;
    Ok(parsed.host_str().unwrap_or("").to_string())
}

/// Sorts requirements by ascending `maxAmountRequired`, tie-breaking toward
/// L2 networks over L1.
fn select_requirement<'a>(
    response: &'a PaymentRequiredResponse,
    config: &X402ClientConfig,
) -> Result<&'a PaymentRequirements> {
    let mut candidates: Vec<&PaymentRequirements> = response.accepts.iter().collect();
    if candidates.is_empty() {
        return Err(X402Error::NoSuitableRequirement);
    }

    if let Some(scheme) = &config.preferred_scheme {
        let filtered: Vec<_> = candidates.iter().filter(|r| &r.scheme == scheme).copied().collect();
        if !filtered.is_empty() {
            candidates = filtered;
        }
    }
    if let Some(network) = &config.preferred_network {
        let filtered: Vec<_> = candidates.iter().filter(|r| &r.network == network).copied().collect();
        if !filtered.is_empty() {
            candidates = filtered;
        }
    }

    candidates.sort_by(|a, b| {
        let a_amount: u128 = a.max_amount_required.parse().unwrap_or(u128::MAX);
        let b_amount: u128 = b.max_amount_required.parse().unwrap_or(u128::MAX);
        a_amount.cmp(&b_amount).then_with(|| {
            let a_l2 = Network::from_id(&a.network).map(Network::is_l2).unwrap_or(false);
            let b_l2 = Network::from_id(&b.network).map(Network::is_l2).unwrap_or(false);
            b_l2.cmp(&a_l2)
        })
    });

    candidates.first().copied().ok_or(X402Error::NoSuitableRequirement)
}

async fn generate_payment_payload(
    requirement: &PaymentRequirements,
    config: &X402ClientConfig,
) -> Result<PaymentPayload> {
    validate_requirements(requirement)?;
    let scheme: Arc<dyn Scheme> = match requirement.scheme.as_str() {
        "exact" => Arc::new(ExactEvm::new()),
        "upto" => Arc::new(UptoEvm::new()),
        _ => return Err(X402Error::UnsupportedScheme(requirement.scheme.clone())),
    };
    scheme
        .generate_payload(requirement, &config.private_key, &config.rpc_url)
        .await
}

/// Optional callback invoked after option selection, before signing. Return
/// `false` to abort the payment (terminal [`X402Error::PaymentDeclined`]).
pub type PaymentDecision<'a> = dyn Fn(&PaymentRequirements) -> bool + Send + Sync + 'a;

/// Makes an HTTP request with automatic x402 payment handling.
pub async fn request_with_payment(
    config: &X402ClientConfig,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<PaidResponse> {
    request_with_payment_and_decision(config, method, url, body, None).await
}

/// Full pipeline with an optional payment-decision callback.
pub async fn request_with_payment_and_decision(
    config: &X402ClientConfig,
    method: Method,
    url: &str,
    body: Option<Value>,
    payment_decision: Option<&PaymentDecision<'_>>,
) -> Result<PaidResponse> {
    let host = host_of(url)?;
    let breaker = config.breaker_for_host(&host);

    if !breaker.allow_request() {
        return Err(X402Error::CircuitBreakerOpen(host));
    }

    let outcome = config
        .retry_policy
        .execute(
            || async {
                attempt_request(config, method.clone(), url, body.clone(), payment_decision).await
            },
            |e: &X402Error| e.is_retryable(),
        )
        .await;

    match &outcome {
        Ok(_) => breaker.record_success(),
        Err(e) if e.is_retryable() => breaker.record_failure(),
        Err(_) => {}
    }
    outcome
}

async fn attempt_request(
    config: &X402ClientConfig,
    method: Method,
    url: &str,
    body: Option<Value>,
    payment_decision: Option<&PaymentDecision<'_>>,
) -> Result<PaidResponse> {
    let mut request = config
        .http_client
        .request(method.clone(), url)
        .timeout(config.timeout);
    if let Some(body) = &body {
        request = request.json(body);
    }

    let response = request.send().await?;

    if response.status() != StatusCode::PAYMENT_REQUIRED {
        return Ok(PaidResponse {
            response,
            paid: false,
            tx_hash: None,
        });
    }

    let payment_info: PaymentRequiredResponse = response.json().await?;
    if payment_info.accepts.is_empty() {
        return Err(X402Error::NoSuitableRequirement);
    }

    let requirement = select_requirement(&payment_info, config)?;
    config.events.emit(
        EventKind::PaymentInitiated,
        serde_json::json!({"resource": requirement.resource, "network": requirement.network}),
    );

    if let Some(decision) = payment_decision {
        if !decision(requirement) {
            config.events.emit(
                EventKind::PaymentFailed,
                serde_json::json!({"reason": "declined"}),
            );
            return Err(X402Error::PaymentDeclined);
        }
    }

    if let Some(max_amount) = &config.max_amount {
        let max: u128 = max_amount.parse().unwrap_or(u128::MAX);
        let required: u128 = requirement.max_amount_required.parse().unwrap_or(u128::MAX);
        if required > max {
            config.events.emit(
                EventKind::PaymentFailed,
                serde_json::json!({"reason": "price_exceeds_max"}),
            );
            return Err(X402Error::PriceExceedsMax);
        }
    }

    let payload = generate_payment_payload(requirement, config).await?;
    config.events.emit(
        EventKind::PaymentSigned,
        serde_json::json!({"scheme": payload.scheme, "network": payload.network}),
    );

    let payment_header = encode_payment_header(&payload)?;

    let mut retry_request = config
        .http_client
        .request(method, url)
        .timeout(config.timeout)
        .header("X-PAYMENT", payment_header);
    if let Some(body) = body {
        retry_request = retry_request.json(&body);
    }

    let retry_response = retry_request.send().await?;

    let tx_hash = retry_response
        .headers()
        .get("X-PAYMENT-RESPONSE")
        .and_then(|v| v.to_str().ok())
        .and_then(|encoded| decode_payment_header(encoded).ok().map(|_| encoded.to_string()))
        .and_then(|encoded| {
            crate::codec::safe_decode::<crate::types::PaymentResponse>(&encoded)
                .ok()
                .map(|r| r.tx_hash)
        });

    if let Some(tx_hash) = &tx_hash {
        config.events.emit(
            EventKind::PaymentSettled,
            serde_json::json!({"tx_hash": tx_hash}),
        );
    } else {
        debug!("X-PAYMENT-RESPONSE missing or malformed; ignoring receipt");
    }

    Ok(PaidResponse {
        response: retry_response,
        paid: true,
        tx_hash,
    })
}

/// Wraps a chunk stream to emit `payment:stream_ended` exactly once when the
/// inner stream is exhausted, without disturbing already-yielded items.
struct StreamEndEvents<S> {
    inner: S,
    events: Arc<EventBus>,
    ended: bool,
}

impl<S: Stream<Item = Result<String>> + Unpin> Stream for StreamEndEvents<S> {
    type Item = Result<String>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        if self.ended {
            return std::task::Poll::Ready(None);
        }
        match std::pin::Pin::new(&mut self.inner).poll_next(cx) {
            std::task::Poll::Ready(None) => {
                self.ended = true;
                self.events.emit(EventKind::StreamEnded, serde_json::json!({}));
                std::task::Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Streaming variant: identical handshake, but the final body is exposed as
/// a lazy stream of UTF-8 chunks with a tripled timeout. Stream failures are
/// reported without rolling back the already-settled payment.
pub async fn stream_with_payment(
    config: &X402ClientConfig,
    url: &str,
) -> Result<impl Stream<Item = Result<String>>> {
    use futures_util::StreamExt;

    let mut streaming_config = config.clone();
    streaming_config.timeout = config.timeout * STREAMING_TIMEOUT_MULTIPLIER;

    config.events.emit(EventKind::StreamStarted, serde_json::json!({"url": url}));

    let paid = request_with_payment(&streaming_config, Method::GET, url, None).await?;
    let events = Arc::clone(&config.events);

    let byte_stream = paid.response.bytes_stream();
    let mapped = byte_stream.map(move |chunk| match chunk {
        Ok(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => {
                events.emit(EventKind::StreamChunk, serde_json::json!({"bytes": text.len()}));
                Ok(text)
            }
            Err(e) => Err(X402Error::InvalidPayload(format!("non-UTF-8 stream chunk: {e}"))),
        },
        Err(e) => Err(X402Error::HttpError(e)),
    });

    Ok(StreamEndEvents {
        inner: mapped,
        events: Arc::clone(&config.events),
        ended: false,
    })
}

/// A simpler convenience function for GET requests.
pub async fn get(config: &X402ClientConfig, url: &str) -> Result<Response> {
    Ok(request_with_payment(config, Method::GET, url, None).await?.response)
}

/// A simpler convenience function for POST requests.
pub async fn post(config: &X402ClientConfig, url: &str, body: Value) -> Result<Response> {
    Ok(request_with_payment(config, Method::POST, url, Some(body)).await?.response)
}
