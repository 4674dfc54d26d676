//! Relay configuration.
use crate::{
    chains::SchemeKind,
    constants::{
        DEFAULT_GAS_BUFFER_MULTIPLIER, DEFAULT_PRICE_FEED_TIMEOUT, DEFAULT_PRICE_FEED_URL,
        DEFAULT_RECEIPT_TIMEOUT, DEFAULT_REPLAY_TTL, DEFAULT_RPC_TIMEOUT, MAX_BATCH_SIZE,
        PRICE_TTL,
    },
};
use alloy::primitives::{Address, ChainId};
use eyre::Context;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use std::{
    collections::BTreeMap,
    net::{IpAddr, Ipv4Addr},
    path::Path,
    time::Duration,
};
use url::Url;

/// Relay configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Chain configurations.
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    /// Price feed configuration.
    #[serde(default)]
    pub price_feed: PriceFeedConfig,
    /// Transaction configuration.
    #[serde(default)]
    pub transactions: TransactionConfig,
    /// Secrets.
    #[serde(skip_serializing, default)]
    pub secrets: SecretsConfig,
}

impl RelayConfig {
    /// Sets the IP address to serve the RPC on.
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.server.address = address;
        self
    }

    /// Sets the port to serve the RPC on.
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Sets the port to serve the metrics on.
    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.server.metrics_port = port;
        self
    }

    /// Sets the chains.
    pub fn with_chains(self, chains: Vec<ChainConfig>) -> Self {
        Self { chains, ..self }
    }

    /// Sets the price feed endpoint.
    pub fn with_price_feed_endpoint(mut self, endpoint: Option<Url>) -> Self {
        if let Some(endpoint) = endpoint {
            self.price_feed.endpoint = endpoint;
        }
        self
    }

    /// Sets a constant USD price for every feed. Used for testing.
    pub fn with_constant_price(mut self, constant_price: Option<f64>) -> Self {
        self.price_feed.constant_price = constant_price.or(self.price_feed.constant_price);
        self
    }

    /// Sets the key used to sign relayed transactions.
    pub fn with_relayer_key(mut self, relayer_key: Option<String>) -> Self {
        if let Some(relayer_key) = relayer_key {
            self.secrets.relayer_key = relayer_key;
        }
        self
    }

    /// Sets the timeout of requests sent to chain nodes.
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.transactions.rpc_timeout = timeout;
        self
    }

    /// Load from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address to serve the RPC on.
    pub address: IpAddr,
    /// The port to serve the RPC on.
    pub port: u16,
    /// The port to serve the metrics on.
    pub metrics_port: u16,
    /// The maximum number of concurrent connections the relay can handle.
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 9119,
            metrics_port: 9000,
            max_connections: 1000,
        }
    }
}

/// Configuration of a single supported chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// The chain ID.
    pub chain_id: ChainId,
    /// Optional human readable name, e.g. `sepolia`.
    #[serde(default)]
    pub name: Option<String>,
    /// The RPC endpoint of the chain.
    pub rpc_url: Url,
    /// The relayer contract. Left empty until the contract is deployed.
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// Explorer URL for transactions. `{txHash}` is replaced by the transaction hash, otherwise
    /// `/tx/<hash>` is appended.
    pub explorer_url: String,
    /// Decimals of the native currency.
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u8,
    /// Supported tokens by symbol.
    #[serde(default)]
    pub tokens: BTreeMap<String, TokenConfig>,
    /// Fee settings.
    pub fee_settings: FeeSettings,
    /// Gas settings.
    pub gas_settings: GasSettings,
    /// Signature scheme the deployed contract verifies.
    #[serde(default)]
    pub signature_scheme: SchemeKind,
    /// EIP-712 domain of the deployed contract.
    #[serde(default)]
    pub domain: DomainConfig,
}

const fn default_native_decimals() -> u8 {
    18
}

/// Configuration of a token on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfig {
    /// Token contract address.
    pub address: Address,
    /// Token decimals.
    pub decimals: u8,
    /// Identifier of the USD price feed of the token.
    pub price_feed_id: String,
}

/// Fee bounds of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSettings {
    /// Fee charged as a share of the amount, in basis points.
    pub base_fee_bps: u16,
    /// Maximum fee as a share of the amount, in basis points.
    pub max_fee_bps: u16,
    /// Minimum fee in USD.
    pub min_fee_usd: f64,
}

/// Gas settings of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasSettings {
    /// Fallback max fee per gas, in wei.
    pub max_fee_per_gas: u128,
    /// Fallback max priority fee per gas, in wei.
    pub max_priority_fee_per_gas: u128,
    /// Upper bound for the gas limit of a relayed transaction.
    pub gas_limit: u64,
    /// Multiplier applied to simulated gas usage.
    #[serde(default = "default_buffer_multiplier")]
    pub buffer_multiplier: f64,
    /// Ceiling for the max fee per gas, in wei.
    #[serde(default)]
    pub max_gas_price: Option<u128>,
}

const fn default_buffer_multiplier() -> f64 {
    DEFAULT_GAS_BUFFER_MULTIPLIER
}

/// EIP-712 domain name and version of the relayer contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain name.
    pub name: String,
    /// Domain version.
    pub version: String,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self { name: "GaslessRelayer".to_string(), version: "1".to_string() }
    }
}

/// Price feed configuration.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeedConfig {
    /// Base URL of the price feed.
    pub endpoint: Url,
    /// How long fetched prices are served from cache.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub ttl: Duration,
    /// Timeout of a single price request.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    /// A constant price returned for every feed. For testing only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant_price: Option<f64>,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_PRICE_FEED_URL).expect("valid url"),
            ttl: PRICE_TTL,
            timeout: DEFAULT_PRICE_FEED_TIMEOUT,
            constant_price: None,
        }
    }
}

/// Configuration of transaction submission.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Timeout applied to each request sent to a chain node.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub rpc_timeout: Duration,
    /// How long to wait for a receipt after broadcasting.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub receipt_timeout: Duration,
    /// Confirmations required before a transfer is reported as confirmed.
    pub confirmations: u64,
    /// How long idempotency keys are kept.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub replay_ttl: Duration,
    /// Maximum number of transfers in a batch request.
    pub max_batch_size: usize,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            confirmations: 1,
            replay_ttl: DEFAULT_REPLAY_TTL,
            max_batch_size: MAX_BATCH_SIZE,
        }
    }
}

/// Secrets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Private key of the relayer account.
    pub relayer_key: String,
}
