//! Registry of well-known blockchain networks.
//!
//! Network data is static, process-wide, read-only: chain id, the
//! canonical USD-pegged stablecoin contract on that network, a default
//! RPC endpoint, the block-explorer root, average block time, a
//! relative gas-cost multiplier used only for cross-chain comparisons
//! (Base is the `1.0` baseline), and a rough gas-price/native-token-price
//! pair used only to quote `/estimate-gas` in USD.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported x402 network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    /// Base mainnet.
    BaseMainnet,
    /// Base Sepolia testnet.
    BaseSepolia,
    /// Ethereum mainnet.
    EthereumMainnet,
    /// Arbitrum One.
    ArbitrumOne,
    /// Optimism mainnet.
    OptimismMainnet,
}

/// Static facts about a [`Network`].
#[derive(Debug, Clone, Copy)]
pub struct NetworkInfo {
    /// The network this info describes.
    pub network: Network,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Canonical USD-pegged stablecoin contract address on this network.
    pub usdc_address: &'static str,
    /// Default JSON-RPC endpoint.
    pub default_rpc_url: &'static str,
    /// Block-explorer root URL.
    pub explorer_root: &'static str,
    /// Average block time, in seconds.
    pub avg_block_time_secs: f64,
    /// Relative gas-cost multiplier, Base = 1.0. For cross-chain
    /// comparison only; never used in on-chain math.
    pub gas_multiplier: f64,
    /// Rough gas price, in gwei, used only for `/estimate-gas`'s USD quote.
    /// A static approximation, not a live oracle read.
    pub approx_gas_price_gwei: f64,
    /// Rough USD price of the network's native gas token, used only for
    /// `/estimate-gas`'s USD quote. A static approximation, not a live feed.
    pub native_token_usd_price: f64,
}

const NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        network: Network::BaseMainnet,
        chain_id: 8453,
        usdc_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        default_rpc_url: "https://mainnet.base.org",
        explorer_root: "https://basescan.org",
        avg_block_time_secs: 2.0,
        gas_multiplier: 1.0,
        approx_gas_price_gwei: 0.02,
        native_token_usd_price: 3000.0,
    },
    NetworkInfo {
        network: Network::BaseSepolia,
        chain_id: 84532,
        usdc_address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        default_rpc_url: "https://sepolia.base.org",
        explorer_root: "https://sepolia.basescan.org",
        avg_block_time_secs: 2.0,
        gas_multiplier: 1.0,
        approx_gas_price_gwei: 0.02,
        native_token_usd_price: 3000.0,
    },
    NetworkInfo {
        network: Network::EthereumMainnet,
        chain_id: 1,
        usdc_address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        default_rpc_url: "https://eth.llamarpc.com",
        explorer_root: "https://etherscan.io",
        avg_block_time_secs: 12.0,
        gas_multiplier: 15.0,
        approx_gas_price_gwei: 20.0,
        native_token_usd_price: 3000.0,
    },
    NetworkInfo {
        network: Network::ArbitrumOne,
        chain_id: 42161,
        usdc_address: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831",
        default_rpc_url: "https://arb1.arbitrum.io/rpc",
        explorer_root: "https://arbiscan.io",
        avg_block_time_secs: 0.25,
        gas_multiplier: 1.2,
        approx_gas_price_gwei: 0.1,
        native_token_usd_price: 3000.0,
    },
    NetworkInfo {
        network: Network::OptimismMainnet,
        chain_id: 10,
        usdc_address: "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85",
        default_rpc_url: "https://mainnet.optimism.io",
        explorer_root: "https://optimistic.etherscan.io",
        avg_block_time_secs: 2.0,
        gas_multiplier: 1.1,
        approx_gas_price_gwei: 0.05,
        native_token_usd_price: 3000.0,
    },
];

impl Network {
    /// Returns the static [`NetworkInfo`] for this network.
    #[must_use]
    pub fn info(self) -> &'static NetworkInfo {
        NETWORKS
            .iter()
            .find(|n| n.network == self)
            .expect("every Network variant has a NetworkInfo entry")
    }

    /// Parses a network from its wire identifier (e.g. `"base-sepolia"`).
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "base-mainnet" => Some(Network::BaseMainnet),
            "base-sepolia" => Some(Network::BaseSepolia),
            "ethereum-mainnet" => Some(Network::EthereumMainnet),
            "arbitrum-one" => Some(Network::ArbitrumOne),
            "optimism-mainnet" => Some(Network::OptimismMainnet),
            _ => None,
        }
    }

    /// Returns the wire identifier for this network (e.g. `"base-sepolia"`).
    #[must_use]
    pub fn as_id(self) -> &'static str {
        match self {
            Network::BaseMainnet => "base-mainnet",
            Network::BaseSepolia => "base-sepolia",
            Network::EthereumMainnet => "ethereum-mainnet",
            Network::ArbitrumOne => "arbitrum-one",
            Network::OptimismMainnet => "optimism-mainnet",
        }
    }

    /// Returns `true` for layer-2 networks, used by the client's option
    /// selection tie-break (cheaper-is-better, then prefer L2 over L1).
    #[must_use]
    pub fn is_l2(self) -> bool {
        !matches!(self, Network::EthereumMainnet)
    }

    /// All networks this build advertises support for.
    #[must_use]
    pub fn all() -> impl Iterator<Item = Network> {
        NETWORKS.iter().map(|n| n.network)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_id())
    }
}
