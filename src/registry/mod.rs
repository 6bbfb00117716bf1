//! Static per-chain registry: tokens, pricing venues, wallets.
//!
//! The registry is loaded once at startup from a config file and passed by
//! reference everywhere; there is no mutable global state. Validation happens
//! at load so a malformed entry fails the process before any block runs.

pub mod pairs;
pub mod tokens;

use alloy::primitives::Address;
use config::{Config, File};
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::ValuationError;
use crate::records::SupplyCategory;

pub use pairs::{PairHandler, PoolKind};
pub use tokens::{TokenCategory, TokenMeta};

/// A labelled address (treasury wallet, allocator, staking venue).
#[derive(Debug, Clone, Deserialize)]
pub struct NamedAddress {
    pub name: String,
    pub address: Address,
}

/// A venue whose protocol-token balance reduces a supply metric: bond
/// contracts, lending markets, offset wallets.
#[derive(Debug, Clone, Deserialize)]
pub struct SupplyVenue {
    pub name: String,
    pub address: Address,
    pub category: SupplyCategory,
}

/// Raw file shape; turned into lookup maps by [`Registry::load`].
#[derive(Debug, Deserialize)]
pub(crate) struct RegistryFile {
    pub(crate) chain: String,
    pub(crate) protocol_token: Address,
    pub(crate) staked_wrapper: Address,
    pub(crate) staking_contract: Address,
    pub(crate) wrapped_native: Address,
    /// Shared Balancer V2 vault, required when any weighted pool is configured.
    #[serde(default)]
    pub(crate) balancer_vault: Option<Address>,
    pub(crate) tokens: Vec<TokenMeta>,
    /// token address -> pricing venue
    pub(crate) pairs: Vec<PairEntry>,
    /// Pools the protocol token trades in; the resolver picks the deepest.
    pub(crate) protocol_pairs: Vec<PairHandler>,
    pub(crate) treasury_wallets: Vec<NamedAddress>,
    #[serde(default)]
    pub(crate) supply_venues: Vec<SupplyVenue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PairEntry {
    pub(crate) token: Address,
    #[serde(flatten)]
    pub(crate) handler: PairHandler,
}

/// Immutable per-chain configuration consumed by the valuation engine.
#[derive(Debug)]
pub struct Registry {
    pub chain: String,
    /// The protocol's own base asset (the "OHM" of the deployment).
    pub protocol_token: Address,
    /// Rebasing wrapper of the protocol token (gOHM-equivalent).
    pub staked_wrapper: Address,
    /// Staking contract exposing the cumulative rebase index.
    pub staking_contract: Address,
    pub wrapped_native: Address,
    pub balancer_vault: Option<Address>,
    pub protocol_pairs: Vec<PairHandler>,
    pub treasury_wallets: Vec<NamedAddress>,
    pub supply_venues: Vec<SupplyVenue>,
    tokens: FxHashMap<Address, TokenMeta>,
    pairs: FxHashMap<Address, PairHandler>,
}

impl Registry {
    /// Load and validate a registry file (yaml/toml/json, per the `config`
    /// crate's extension handling).
    pub fn load(path: &str) -> Result<Self, ValuationError> {
        let raw: RegistryFile = Config::builder()
            .add_source(File::with_name(path))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ValuationError::Configuration(format!("registry {path}: {e}")))?;
        Self::from_file(raw)
    }

    pub(crate) fn from_file(raw: RegistryFile) -> Result<Self, ValuationError> {
        let mut tokens = FxHashMap::default();
        for meta in raw.tokens {
            if let Some(m) = meta.liquid_backing_multiplier {
                if !(0.0..=1.0).contains(&m) {
                    return Err(ValuationError::Configuration(format!(
                        "token {} multiplier {m} outside [0, 1]",
                        meta.symbol
                    )));
                }
            }
            if tokens.insert(meta.address, meta).is_some() {
                return Err(ValuationError::Configuration(
                    "duplicate token registry entry".into(),
                ));
            }
        }

        let mut pairs = FxHashMap::default();
        for entry in raw.pairs {
            validate_handler(&entry.handler)?;
            if pairs.insert(entry.token, entry.handler).is_some() {
                return Err(ValuationError::Configuration(
                    "duplicate pair handler entry".into(),
                ));
            }
        }
        for handler in &raw.protocol_pairs {
            validate_handler(handler)?;
        }
        if raw.protocol_pairs.is_empty() {
            return Err(ValuationError::Configuration(
                "no protocol price pairs configured".into(),
            ));
        }

        Ok(Registry {
            chain: raw.chain,
            protocol_token: raw.protocol_token,
            staked_wrapper: raw.staked_wrapper,
            staking_contract: raw.staking_contract,
            wrapped_native: raw.wrapped_native,
            balancer_vault: raw.balancer_vault,
            protocol_pairs: raw.protocol_pairs,
            treasury_wallets: raw.treasury_wallets,
            supply_venues: raw.supply_venues,
            tokens,
            pairs,
        })
    }

    pub fn token(&self, address: Address) -> Option<&TokenMeta> {
        self.tokens.get(&address)
    }

    /// Registry metadata for a token, or a configuration error naming it.
    pub fn token_required(&self, address: Address) -> Result<&TokenMeta, ValuationError> {
        self.tokens
            .get(&address)
            .ok_or_else(|| ValuationError::Configuration(format!("token {address} not in registry")))
    }

    pub fn pair_handler(&self, token: Address) -> Option<&PairHandler> {
        self.pairs.get(&token)
    }

    pub fn is_stable(&self, address: Address) -> bool {
        matches!(
            self.tokens.get(&address),
            Some(meta) if meta.category == TokenCategory::Stable
        )
    }

    pub fn is_base_token(&self, address: Address) -> bool {
        matches!(self.tokens.get(&address), Some(meta) if meta.is_base_token())
    }

    pub fn is_protocol_token(&self, address: Address) -> bool {
        address == self.protocol_token
    }

    /// All treasury-tracked tokens, iteration order unspecified.
    pub fn tokens(&self) -> impl Iterator<Item = &TokenMeta> {
        self.tokens.values()
    }
}

fn validate_handler(handler: &PairHandler) -> Result<(), ValuationError> {
    if handler.kind == PoolKind::Weighted && handler.pool_id.is_none() {
        return Err(ValuationError::Configuration(format!(
            "weighted pool {} missing pool_id",
            handler.address
        )));
    }
    Ok(())
}
