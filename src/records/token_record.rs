use alloy::primitives::Address;
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ValuationError;
use crate::pricing::PriceResolver;
use crate::registry::{TokenCategory, TokenMeta};

/// One valuation record: a token balance held by one source at one block.
///
/// `value` and `value_excluding_ohm` are derived here and nowhere else;
/// they are private so no caller can set them out of step with
/// `balance × rate (× multiplier)`.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRecord {
    pub date: NaiveDate,
    pub block: u64,
    pub timestamp: u64,
    pub blockchain: String,
    pub token: String,
    pub token_address: Address,
    pub source: String,
    pub source_address: Address,
    pub rate: f64,
    pub balance: f64,
    pub multiplier: f64,
    pub category: TokenCategory,
    pub is_liquid: bool,
    pub is_bluechip: bool,
    value: f64,
    value_excluding_ohm: f64,
}

/// Inputs that do not come from the registry or the resolver.
pub struct RecordContext<'a> {
    pub blockchain: &'a str,
    pub date: NaiveDate,
    pub timestamp: u64,
    pub block: u64,
}

impl TokenRecord {
    /// Build a record, resolving the rate unless the caller already has one
    /// (a pool valuation that priced its own LP token passes it through).
    ///
    /// Multiplier priority: caller override, then the registry's fixed
    /// override, then 1.0.
    #[allow(clippy::too_many_arguments)]
    pub async fn build(
        resolver: &PriceResolver,
        ctx: &RecordContext<'_>,
        meta: &TokenMeta,
        source: &str,
        source_address: Address,
        balance: f64,
        rate_override: Option<f64>,
        multiplier_override: Option<f64>,
    ) -> Result<TokenRecord, ValuationError> {
        let rate = match rate_override {
            Some(rate) => rate,
            None => resolver.resolve(meta.address, ctx.block).await?,
        };

        let multiplier = multiplier_override
            .or(meta.liquid_backing_multiplier)
            .unwrap_or(1.0);
        if !(0.0..=1.0).contains(&multiplier) {
            return Err(ValuationError::Configuration(format!(
                "multiplier {multiplier} for {} outside [0, 1]",
                meta.symbol
            )));
        }

        Ok(TokenRecord {
            date: ctx.date,
            block: ctx.block,
            timestamp: ctx.timestamp,
            blockchain: ctx.blockchain.to_string(),
            token: meta.symbol.clone(),
            token_address: meta.address,
            source: source.to_string(),
            source_address,
            rate,
            balance,
            multiplier,
            category: meta.category,
            is_liquid: meta.is_liquid,
            is_bluechip: meta.is_volatile_bluechip,
            value: balance * rate,
            value_excluding_ohm: balance * rate * multiplier,
        })
    }

    /// `balance × rate`.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// `balance × rate × multiplier`, the liquid-backing contribution.
    pub fn value_excluding_ohm(&self) -> f64 {
        self.value_excluding_ohm
    }

    /// Identity tuple for dedup/idempotence checks.
    pub fn id(&self) -> (NaiveDate, u64, &str, &str) {
        (self.date, self.block, &self.source, &self.token)
    }
}
