//! Pure aggregation over record arrays.
//!
//! The three supply metrics share one declarative tier table instead of
//! three hand-maintained inclusion sets, so adding a `SupplyCategory`
//! forces a single decision here and the supersets stay nested by
//! construction.

pub mod checks;

use crate::records::{SupplyCategory, TokenRecord, TokenSupply};

pub use checks::{run_sanity_checks, SanityCheck};

/// Successively broader supply definitions, ordered by inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyMetric {
    Circulating,
    Floating,
    Backed,
}

/// The narrowest metric a bucket belongs to; `None` for buckets tracked but
/// excluded from all three (vesting bond payout tokens).
pub fn tier(category: SupplyCategory) -> Option<SupplyMetric> {
    use SupplyCategory::*;
    match category {
        TotalSupply | Treasury | Offset | BondsPreminted | BondsVestingDeposits
        | BondsDeposits => Some(SupplyMetric::Circulating),
        Liquidity => Some(SupplyMetric::Floating),
        Lending => Some(SupplyMetric::Backed),
        BondsVestingTokens => None,
    }
}

/// Whether a bucket contributes to `metric`. Broader metrics include every
/// narrower tier, which is exactly the nesting invariant.
pub fn included_in(category: SupplyCategory, metric: SupplyMetric) -> bool {
    matches!(tier(category), Some(t) if t <= metric)
}

/// Total USD value of all treasury records.
pub fn market_value(records: &[TokenRecord]) -> f64 {
    records.iter().map(TokenRecord::value).sum()
}

/// Treasury value excluding the protocol's own asset, over liquid assets
/// only. The conservative backing metric.
pub fn liquid_backing(records: &[TokenRecord]) -> f64 {
    records
        .iter()
        .filter(|r| r.is_liquid)
        .map(TokenRecord::value_excluding_ohm)
        .sum()
}

fn metric_supply(supplies: &[TokenSupply], metric: SupplyMetric) -> f64 {
    supplies
        .iter()
        .filter(|s| included_in(s.category, metric))
        .map(TokenSupply::supply_balance)
        .sum()
}

pub fn circulating_supply(supplies: &[TokenSupply]) -> f64 {
    metric_supply(supplies, SupplyMetric::Circulating)
}

pub fn floating_supply(supplies: &[TokenSupply]) -> f64 {
    metric_supply(supplies, SupplyMetric::Floating)
}

pub fn backed_supply(supplies: &[TokenSupply]) -> f64 {
    metric_supply(supplies, SupplyMetric::Backed)
}
