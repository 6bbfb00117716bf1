use alloy::primitives::Address;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Accounting bucket of a supply adjustment.
///
/// The tier table in [`crate::metrics`] decides which buckets feed which
/// supply metric; this enum only names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyCategory {
    TotalSupply,
    Treasury,
    Offset,
    BondsPreminted,
    BondsVestingDeposits,
    BondsVestingTokens,
    BondsDeposits,
    Liquidity,
    Lending,
}

/// Direction of a supply adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplySign {
    Add,
    Deduct,
}

impl SupplySign {
    pub fn signum(self) -> i8 {
        match self {
            SupplySign::Add => 1,
            SupplySign::Deduct => -1,
        }
    }
}

/// One signed supply adjustment for the protocol token.
///
/// `supply_balance` is derived (`balance × sign`) at construction and never
/// assigned independently.
#[derive(Debug, Clone, Serialize)]
pub struct TokenSupply {
    pub date: NaiveDate,
    pub block: u64,
    pub blockchain: String,
    pub token: String,
    pub token_address: Address,
    pub category: SupplyCategory,
    /// Liquidity pool this adjustment came from, when applicable.
    pub pool: Option<Address>,
    pub source: String,
    pub source_address: Option<Address>,
    pub balance: f64,
    pub sign: i8,
    supply_balance: f64,
}

impl TokenSupply {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date: NaiveDate,
        block: u64,
        blockchain: &str,
        token: &str,
        token_address: Address,
        category: SupplyCategory,
        pool: Option<Address>,
        source: &str,
        source_address: Option<Address>,
        balance: f64,
        sign: SupplySign,
    ) -> Self {
        let sign = sign.signum();
        TokenSupply {
            date,
            block,
            blockchain: blockchain.to_string(),
            token: token.to_string(),
            token_address,
            category,
            pool,
            source: source.to_string(),
            source_address,
            balance,
            sign,
            supply_balance: balance * sign as f64,
        }
    }

    /// `balance × sign`.
    pub fn supply_balance(&self) -> f64 {
        self.supply_balance
    }
}
