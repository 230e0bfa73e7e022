//! Error types for the x402-core library.
//!
//! This module defines all error types that can occur during x402 protocol operations.

use thiserror::Error;

/// Main error type for x402 operations.
#[derive(Error, Debug)]
pub enum X402Error {
    /// Error during HTTP request/response handling
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during Base64 encoding/decoding
    #[error("Base64 error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// Error during blockchain operations
    #[error("Blockchain error: {0}")]
    BlockchainError(String),

    /// Invalid payment payload
    #[error("Invalid payment payload: {0}")]
    InvalidPayload(String),

    /// Payment verification failed
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Payment settlement failed
    #[error("Settlement failed: {0}")]
    SettlementError(String),

    /// Unsupported payment scheme
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// Unsupported network
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// Invalid address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Timeout exceeded
    #[error("Timeout exceeded")]
    TimeoutExceeded,

    /// Signature verification failed
    #[error("Signature verification failed: {0}")]
    SignatureError(String),

    /// Nonce already used (replay attack prevention)
    #[error("nonce already used (replay detected): {0}")]
    NonceUsed(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No suitable payment requirement found
    #[error("No suitable payment requirement found")]
    NoSuitableRequirement,

    /// The response was not a 402 Payment Required
    #[error("Expected 402 Payment Required, got status: {0}")]
    Not402Response(u16),

    /// Error parsing URL
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// The caller's `paymentDecision` callback refused the payment.
    #[error("payment declined")]
    PaymentDeclined,

    /// The requirement's price exceeded the caller's configured ceiling.
    #[error("price exceeds max willing to pay")]
    PriceExceedsMax,

    /// A wire-format value failed shape/range validation.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The per-host circuit breaker is open and is short-circuiting calls.
    #[error("circuit breaker open for host: {0}")]
    CircuitBreakerOpen(String),

    /// The token-bucket rate limiter rejected the call.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// The facilitator returned a non-success HTTP status.
    #[error("facilitator error ({status}): {message}")]
    FacilitatorError {
        /// HTTP status code returned by the facilitator.
        status: u16,
        /// Body or reason reported by the facilitator.
        message: String,
    },

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

impl X402Error {
    /// Classifies whether an error is worth retrying.
    ///
    /// Structural rejections (replay, insufficient funds, policy refusals)
    /// are never retried; transient transport/RPC failures are.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            X402Error::HttpError(e) => e.is_timeout() || e.is_connect() || e.status().is_none(),
            X402Error::BlockchainError(msg) => {
                let lower = msg.to_lowercase();
                !(lower.contains("nonce") || lower.contains("insufficient") || lower.contains("revert"))
            }
            X402Error::NonceUsed(_)
            | X402Error::PaymentDeclined
            | X402Error::PriceExceedsMax
            | X402Error::ValidationError(_)
            | X402Error::SettlementError(_)
            | X402Error::VerificationFailed(_) => false,
            X402Error::TimeoutExceeded => true,
            _ => false,
        }
    }
}

/// Result type alias for x402 operations.
pub type Result<T> = std::result::Result<T, X402Error>;

impl From<ethers::core::types::SignatureError> for X402Error {
    fn from(err: ethers::core::types::SignatureError) -> Self {
        X402Error::SignatureError(err.to_string())
    }
}

impl From<ethers::providers::ProviderError> for X402Error {
    fn from(err: ethers::providers::ProviderError) -> Self {
        X402Error::BlockchainError(err.to_string())
    }
}
