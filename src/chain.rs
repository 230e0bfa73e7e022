//! Per-network EVM provider access: balance queries, pre-flight simulation,
//! and the `transferWithAuthorization` submission path shared by every
//! EVM-settling scheme.

use crate::errors::{Result, X402Error};
use dashmap::DashMap;
use ethers::contract::abigen;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256};
use std::sync::Arc;

abigen!(
    EIP3009Token,
    r#"[
        function transferWithAuthorization(address from, address to, uint256 value, uint256 validAfter, uint256 validBefore, bytes32 nonce, uint8 v, bytes32 r, bytes32 s) external
        function authorizationState(address authorizer, bytes32 nonce) external view returns (bool)
        function balanceOf(address account) external view returns (uint256)
        function decimals() external view returns (uint8)
        function name() external view returns (string)
        function version() external view returns (string)
    ]"#
);

/// Lazily-initialized registry of `Provider<Http>` clients, one per RPC URL,
/// so repeated calls against the same network reuse a connection.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, Arc<Provider<Http>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached provider for `rpc_url`, creating one if absent.
    pub fn get(&self, rpc_url: &str) -> Result<Arc<Provider<Http>>> {
        if let Some(existing) = self.providers.get(rpc_url) {
            return Ok(Arc::clone(&existing));
        }
        let provider = Arc::new(Provider::<Http>::try_from(rpc_url)?);
        self.providers
            .insert(rpc_url.to_string(), Arc::clone(&provider));
        Ok(provider)
    }
}

/// Queries the ERC-20 balance of `owner` for `token` on `rpc_url`.
pub async fn balance_of(rpc_url: &str, token: Address, owner: Address) -> Result<U256> {
    let provider = Provider::<Http>::try_from(rpc_url)?;
    let contract = EIP3009Token::new(token, Arc::new(provider));
    contract
        .balance_of(owner)
        .call()
        .await
        .map_err(|e| X402Error::BlockchainError(format!("balanceOf failed: {e}")))
}

/// Returns `true` if `(authorizer, nonce)` has already been consumed
/// on-chain. This is the authoritative replay guard; [`crate::nonce_cache`]
/// is only a latency optimization in front of it.
pub async fn authorization_used(
    rpc_url: &str,
    token: Address,
    authorizer: Address,
    nonce: H256,
) -> Result<bool> {
    let provider = Provider::<Http>::try_from(rpc_url)?;
    let contract = EIP3009Token::new(token, Arc::new(provider));
    contract
        .authorization_state(authorizer, nonce.into())
        .call()
        .await
        .map_err(|e| X402Error::BlockchainError(format!("authorizationState failed: {e}")))
}

/// Parameters for a `transferWithAuthorization` call, already validated.
pub struct TransferAuthorizationCall {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub valid_after: U256,
    pub valid_before: U256,
    pub nonce: H256,
    pub v: u8,
    pub r: H256,
    pub s: H256,
}

/// Dry-runs `transferWithAuthorization` via `eth_call` before broadcasting,
/// so a revert is caught without spending gas or consuming the nonce.
pub async fn simulate(rpc_url: &str, call: &TransferAuthorizationCall) -> Result<()> {
    let provider = Provider::<Http>::try_from(rpc_url)?;
    let contract = EIP3009Token::new(call.token, Arc::new(provider));
    contract
        .transfer_with_authorization(
            call.from,
            call.to,
            call.value,
            call.valid_after,
            call.valid_before,
            call.nonce.into(),
            call.v,
            call.r.into(),
            call.s.into(),
        )
        .call()
        .await
        .map_err(|e| X402Error::SettlementError(format!("simulation reverted: {e}")))?;
    Ok(())
}

/// Result of a successful on-chain settlement.
pub struct SettlementReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

/// Submits `transferWithAuthorization` using the facilitator's wallet to pay
/// gas, then awaits one confirmation.
pub async fn submit_transfer_with_authorization(
    rpc_url: &str,
    facilitator_key: &str,
    call: TransferAuthorizationCall,
) -> Result<SettlementReceipt> {
    let wallet = facilitator_key
        .parse::<LocalWallet>()
        .map_err(|e| X402Error::ConfigError(format!("invalid facilitator key: {e}")))?;
    let provider = Provider::<Http>::try_from(rpc_url)?;
    let chain_id = provider.get_chainid().await?;
    let client = Arc::new(SignerMiddleware::new(
        provider,
        wallet.with_chain_id(chain_id.as_u64()),
    ));

    let contract = EIP3009Token::new(call.token, client);
    let pending_tx = contract
        .transfer_with_authorization(
            call.from,
            call.to,
            call.value,
            call.valid_after,
            call.valid_before,
            call.nonce.into(),
            call.v,
            call.r.into(),
            call.s.into(),
        )
        .send()
        .await
        .map_err(|e| X402Error::SettlementError(format!("transaction failed: {e}")))?;

    let receipt = pending_tx
        .await
        .map_err(|e| X402Error::SettlementError(format!("receipt error: {e}")))?
        .ok_or_else(|| X402Error::SettlementError("no receipt returned".to_string()))?;

    Ok(SettlementReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number.map(|n| n.as_u64()),
        gas_used: receipt.gas_used,
    })
}

/// Classifies whether a chain-layer error is worth retrying. Reverts from
/// a consumed nonce or insufficient balance are structural and must not be
/// retried; RPC transport hiccups are.
pub fn is_retryable(error: &X402Error) -> bool {
    error.is_retryable()
}
