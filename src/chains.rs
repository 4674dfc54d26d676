//! Registry of supported chains and the tokens configured on them.

use crate::{
    config::{ChainConfig, DomainConfig, FeeSettings, GasSettings},
    constants::{BPS_DENOMINATOR, EXPLORER_TX_PLACEHOLDER},
    error::ChainError,
};
use alloy::primitives::{Address, ChainId, TxHash, map::HashMap};
use alloy_chains::NamedChain;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use url::Url;

/// How transfer authorizations are hashed before signing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemeKind {
    /// EIP-712 typed data.
    #[default]
    TypedData,
    /// `keccak256(abi.encodePacked(..))` wrapped in an EIP-191 personal message.
    PackedHash,
}

/// Gas bounds and fallbacks of a chain.
pub type GasPolicy = GasSettings;

/// Fee bounds of a chain.
pub type FeePolicy = FeeSettings;

/// A token supported on a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenProfile {
    /// Upper-case symbol.
    pub symbol: String,
    /// Token contract.
    pub address: Address,
    /// Token decimals.
    pub decimals: u8,
    /// USD price feed of the token.
    pub price_feed_id: String,
}

/// Immutable configuration of a supported chain.
#[derive(Debug, Clone)]
pub struct ChainProfile {
    /// The chain ID.
    pub chain_id: ChainId,
    /// Human readable name.
    pub name: String,
    /// RPC endpoint.
    pub rpc_endpoint: Url,
    /// Relayer contract, if deployed.
    pub contract_address: Option<Address>,
    /// Decimals of the native currency.
    pub native_decimals: u8,
    /// Explorer URL template for transactions.
    pub explorer_url_template: String,
    /// Gas policy.
    pub gas_policy: GasPolicy,
    /// Fee policy.
    pub fee_policy: FeePolicy,
    /// Signature scheme of the relayer contract.
    pub signature_scheme: SchemeKind,
    /// EIP-712 domain of the relayer contract.
    pub domain: DomainConfig,
    /// Tokens keyed by upper-case symbol.
    tokens: HashMap<String, TokenProfile>,
}

impl ChainProfile {
    /// Builds a profile from configuration, validating fee and gas bounds.
    pub fn from_config(config: ChainConfig) -> Result<Self, ChainError> {
        let chain_id = config.chain_id;
        let fees = &config.fee_settings;
        if fees.base_fee_bps > fees.max_fee_bps {
            return Err(ChainError::misconfigured(
                chain_id,
                format!(
                    "base fee {} bps exceeds max fee {} bps",
                    fees.base_fee_bps, fees.max_fee_bps
                ),
            ));
        }
        if u64::from(fees.max_fee_bps) > BPS_DENOMINATOR {
            return Err(ChainError::misconfigured(
                chain_id,
                format!("max fee {} bps exceeds {BPS_DENOMINATOR}", fees.max_fee_bps),
            ));
        }
        if !(fees.min_fee_usd >= 0.0 && fees.min_fee_usd.is_finite()) {
            return Err(ChainError::misconfigured(chain_id, "minimum fee must be non-negative"));
        }
        if !(config.gas_settings.buffer_multiplier >= 1.0
            && config.gas_settings.buffer_multiplier.is_finite())
        {
            return Err(ChainError::misconfigured(chain_id, "gas buffer multiplier must be >= 1"));
        }

        let tokens = config
            .tokens
            .into_iter()
            .map(|(symbol, token)| {
                let symbol = symbol.to_uppercase();
                let profile = TokenProfile {
                    symbol: symbol.clone(),
                    address: token.address,
                    decimals: token.decimals,
                    price_feed_id: token.price_feed_id,
                };
                (symbol, profile)
            })
            .collect();

        let name = config.name.unwrap_or_else(|| {
            NamedChain::try_from(chain_id)
                .map(|c| c.to_string())
                .unwrap_or_else(|_| chain_id.to_string())
        });

        Ok(Self {
            chain_id,
            name,
            rpc_endpoint: config.rpc_url,
            contract_address: config.contract_address,
            native_decimals: config.native_decimals,
            explorer_url_template: config.explorer_url,
            gas_policy: config.gas_settings,
            fee_policy: config.fee_settings,
            signature_scheme: config.signature_scheme,
            domain: config.domain,
            tokens,
        })
    }

    /// Returns the deployed relayer contract.
    pub fn contract(&self) -> Result<Address, ChainError> {
        self.contract_address
            .filter(|address| !address.is_zero())
            .ok_or_else(|| {
                ChainError::misconfigured(self.chain_id, "relayer contract not deployed")
            })
    }

    /// Looks up a token by symbol, ignoring case.
    pub fn token(&self, symbol: &str) -> Result<&TokenProfile, ChainError> {
        let token = self.tokens.get(&symbol.to_uppercase()).ok_or_else(|| {
            ChainError::UnsupportedToken { chain_id: self.chain_id, symbol: symbol.to_string() }
        })?;
        if token.address.is_zero() {
            return Err(ChainError::misconfigured(
                self.chain_id,
                format!("token {} has no address", token.symbol),
            ));
        }
        Ok(token)
    }

    /// Returns an iterator over the configured tokens.
    pub fn tokens(&self) -> impl Iterator<Item = &TokenProfile> {
        self.tokens.values()
    }

    /// Renders the explorer link of a transaction.
    pub fn explorer_url(&self, tx_hash: TxHash) -> String {
        let hash = tx_hash.to_string();
        if self.explorer_url_template.contains(EXPLORER_TX_PLACEHOLDER) {
            self.explorer_url_template.replace(EXPLORER_TX_PLACEHOLDER, &hash)
        } else {
            format!("{}/tx/{hash}", self.explorer_url_template.trim_end_matches('/'))
        }
    }
}

/// A chain given by numeric id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainRef {
    /// Numeric chain id.
    Id(ChainId),
    /// Chain name such as `sepolia`, or a numeric id given as a string.
    Name(String),
}

impl From<ChainId> for ChainRef {
    fn from(id: ChainId) -> Self {
        Self::Id(id)
    }
}

impl FromStr for ChainRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<ChainId>().map(Self::Id).unwrap_or_else(|_| Self::Name(s.to_string())))
    }
}

impl fmt::Display for ChainRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Read-only registry of supported chains.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<ChainId, Arc<ChainProfile>>,
}

impl ChainRegistry {
    /// Builds the registry, rejecting invalid or duplicate chains.
    pub fn from_configs(
        configs: impl IntoIterator<Item = ChainConfig>,
    ) -> Result<Self, ChainError> {
        let mut chains = HashMap::default();
        for config in configs {
            let profile = ChainProfile::from_config(config)?;
            let chain_id = profile.chain_id;
            if chains.insert(chain_id, Arc::new(profile)).is_some() {
                return Err(ChainError::misconfigured(chain_id, "chain configured twice"));
            }
        }
        Ok(Self { chains })
    }

    /// Resolves a chain by id or name.
    pub fn resolve(&self, chain: &ChainRef) -> Result<Arc<ChainProfile>, ChainError> {
        let unsupported = || ChainError::UnsupportedChain(chain.to_string());
        let chain_id = match chain {
            ChainRef::Id(id) => *id,
            ChainRef::Name(name) => {
                if let Ok(id) = name.parse::<ChainId>() {
                    id
                } else if let Some(profile) =
                    self.chains.values().find(|profile| profile.name.eq_ignore_ascii_case(name))
                {
                    profile.chain_id
                } else {
                    let named =
                        NamedChain::from_str(&name.to_lowercase()).map_err(|_| unsupported())?;
                    named as u64
                }
            }
        };
        self.chains.get(&chain_id).cloned().ok_or_else(unsupported)
    }

    /// Resolves a token on a chain.
    pub fn resolve_token(
        &self,
        chain: &ChainRef,
        symbol: &str,
    ) -> Result<(Arc<ChainProfile>, TokenProfile), ChainError> {
        let profile = self.resolve(chain)?;
        let token = profile.token(symbol)?.clone();
        Ok((profile, token))
    }

    /// Returns an iterator over the supported chains.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ChainProfile>> {
        self.chains.values()
    }

    /// Number of supported chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether no chain is supported.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use alloy::primitives::{address, b256};
    use std::collections::BTreeMap;

    pub(crate) fn sepolia() -> ChainConfig {
        ChainConfig {
            chain_id: 11155111,
            name: None,
            rpc_url: "http://localhost:8545".parse().unwrap(),
            contract_address: Some(address!("0x1111111111111111111111111111111111111111")),
            explorer_url: "https://sepolia.etherscan.io".to_string(),
            native_decimals: 18,
            tokens: BTreeMap::from([(
                "usdc".to_string(),
                TokenConfig {
                    address: address!("0x2222222222222222222222222222222222222222"),
                    decimals: 6,
                    price_feed_id: "usdc-usd".to_string(),
                },
            )]),
            fee_settings: FeeSettings { base_fee_bps: 25, max_fee_bps: 1000, min_fee_usd: 0.10 },
            gas_settings: GasSettings {
                max_fee_per_gas: 30_000_000_000,
                max_priority_fee_per_gas: 1_500_000_000,
                gas_limit: 300_000,
                buffer_multiplier: 1.2,
                max_gas_price: None,
            },
            signature_scheme: SchemeKind::TypedData,
            domain: DomainConfig::default(),
        }
    }

    #[test]
    fn resolves_by_id_and_name() {
        let registry = ChainRegistry::from_configs([sepolia()]).unwrap();

        assert_eq!(registry.resolve(&ChainRef::Id(11155111)).unwrap().chain_id, 11155111);
        assert_eq!(registry.resolve(&"sepolia".parse().unwrap()).unwrap().chain_id, 11155111);
        assert_eq!(registry.resolve(&"11155111".parse().unwrap()).unwrap().chain_id, 11155111);
        assert!(matches!(
            registry.resolve(&"base".parse().unwrap()),
            Err(ChainError::UnsupportedChain(_))
        ));
        assert!(matches!(
            registry.resolve(&"not-a-chain".parse().unwrap()),
            Err(ChainError::UnsupportedChain(_))
        ));
    }

    #[test]
    fn tokens_are_case_insensitive() {
        let registry = ChainRegistry::from_configs([sepolia()]).unwrap();
        let (_, token) = registry.resolve_token(&ChainRef::Id(11155111), "UsDc").unwrap();
        assert_eq!(token.symbol, "USDC");
        assert_eq!(token.decimals, 6);

        assert!(matches!(
            registry.resolve_token(&ChainRef::Id(11155111), "DAI"),
            Err(ChainError::UnsupportedToken { .. })
        ));
    }

    #[test]
    fn rejects_invalid_configs() {
        let mut config = sepolia();
        config.fee_settings.base_fee_bps = 2000;
        assert!(ChainRegistry::from_configs([config]).is_err());

        let mut config = sepolia();
        config.fee_settings.max_fee_bps = 10_001;
        config.fee_settings.base_fee_bps = 10_001;
        assert!(ChainRegistry::from_configs([config]).is_err());

        let mut config = sepolia();
        config.gas_settings.buffer_multiplier = 0.9;
        assert!(ChainRegistry::from_configs([config]).is_err());

        assert!(ChainRegistry::from_configs([sepolia(), sepolia()]).is_err());
    }

    #[test]
    fn undeployed_contract_is_misconfigured() {
        let mut config = sepolia();
        config.contract_address = None;
        let registry = ChainRegistry::from_configs([config]).unwrap();
        let chain = registry.resolve(&ChainRef::Id(11155111)).unwrap();
        assert!(matches!(chain.contract(), Err(ChainError::MisconfiguredChain { .. })));
    }

    #[test]
    fn renders_explorer_urls() {
        let hash = b256!("0x00000000000000000000000000000000000000000000000000000000000000ff");
        let mut config = sepolia();
        let chain = ChainProfile::from_config(config.clone()).unwrap();
        assert_eq!(chain.explorer_url(hash), format!("https://sepolia.etherscan.io/tx/{hash}"));

        config.explorer_url = "https://scan.example/transaction/{txHash}?net=1".to_string();
        let chain = ChainProfile::from_config(config).unwrap();
        assert_eq!(
            chain.explorer_url(hash),
            format!("https://scan.example/transaction/{hash}?net=1")
        );
    }
}
