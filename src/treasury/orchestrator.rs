//! Per-block valuation pipeline.
//!
//! A linear gather → classify → price → aggregate → emit pass. Blocks are
//! processed strictly sequentially by the caller; within one block,
//! independent tokens are priced concurrently and the only shared state is
//! the append-only snapshot caches. Any fatal error aborts the whole block;
//! partial aggregates are never emitted.

use std::sync::Arc;

use alloy::primitives::Address;
use chrono::{DateTime, NaiveDate};
use futures::future::try_join_all;
use log::{info, warn};
use serde::Serialize;

use crate::chain::{balance_of, balances_of_many, total_supply, ChainReader};
use crate::error::ValuationError;
use crate::metrics::{
    backed_supply, circulating_supply, floating_supply, liquid_backing, market_value,
    run_sanity_checks, SanityCheck,
};
use crate::pricing::PriceResolver;
use crate::records::{RecordContext, SupplyCategory, SupplySign, TokenRecord, TokenSupply};
use crate::registry::{Registry, TokenCategory, TokenMeta};

/// Scalar metrics derived from one block's records.
#[derive(Debug, Clone, Serialize)]
pub struct BlockMetrics {
    pub block: u64,
    pub date: NaiveDate,
    pub timestamp: u64,
    pub blockchain: String,
    /// USD rate of the protocol's base asset.
    pub protocol_rate: f64,
    /// USD rate of the rebasing wrapper.
    pub wrapper_rate: f64,
    pub market_value: f64,
    pub liquid_backing: f64,
    pub circulating_supply: f64,
    pub floating_supply: f64,
    pub backed_supply: f64,
}

/// Everything one block's pipeline run produces.
#[derive(Debug, Clone, Serialize)]
pub struct BlockSnapshot {
    pub metrics: BlockMetrics,
    pub records: Vec<TokenRecord>,
    pub supplies: Vec<TokenSupply>,
    pub sanity: Vec<SanityCheck>,
}

pub struct Treasury {
    registry: Arc<Registry>,
    reader: Arc<dyn ChainReader>,
    resolver: Arc<PriceResolver>,
}

impl Treasury {
    pub fn new(registry: Arc<Registry>, reader: Arc<dyn ChainReader>) -> Self {
        let resolver = Arc::new(PriceResolver::new(registry.clone(), reader.clone()));
        Self {
            registry,
            reader,
            resolver,
        }
    }

    pub fn resolver(&self) -> &PriceResolver {
        &self.resolver
    }

    /// Run the full pipeline for one block.
    pub async fn process_block(&self, block: u64) -> Result<BlockSnapshot, ValuationError> {
        let timestamp = self.reader.block_timestamp(block).await?;
        let date = DateTime::from_timestamp(timestamp as i64, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| {
                ValuationError::Configuration(format!("block {block} timestamp {timestamp} out of range"))
            })?;

        let ctx = RecordContext {
            blockchain: &self.registry.chain,
            date,
            timestamp,
            block,
        };

        // Anchor prices first; a treasury snapshot without them is useless,
        // so failure here aborts before any balance work.
        let protocol_rate = self.resolver.resolve(self.registry.protocol_token, block).await?;
        let wrapper_rate = self.resolver.resolve(self.registry.staked_wrapper, block).await?;

        let record_batches = try_join_all(
            self.registry
                .tokens()
                .map(|meta| self.token_records(meta, &ctx)),
        )
        .await?;
        let records: Vec<TokenRecord> = record_batches.into_iter().flatten().collect();

        let supplies = self.supply_records(&ctx).await?;

        let metrics = BlockMetrics {
            block,
            date,
            timestamp,
            blockchain: self.registry.chain.clone(),
            protocol_rate,
            wrapper_rate,
            market_value: market_value(&records),
            liquid_backing: liquid_backing(&records),
            circulating_supply: circulating_supply(&supplies),
            floating_supply: floating_supply(&supplies),
            backed_supply: backed_supply(&supplies),
        };

        let sanity = run_sanity_checks(&records, &supplies);
        for check in sanity.iter().filter(|c| !c.passed) {
            warn!(
                "sanity check {} failed at block {block}: expected {} got {}",
                check.name, check.expected, check.actual
            );
        }

        info!(
            "block {block}: market value {:.2}, liquid backing {:.2}, {} records, {} supplies",
            metrics.market_value,
            metrics.liquid_backing,
            records.len(),
            supplies.len()
        );

        Ok(BlockSnapshot {
            metrics,
            records,
            supplies,
            sanity,
        })
    }

    /// Valuation records for one token across all treasury wallets.
    async fn token_records(
        &self,
        meta: &TokenMeta,
        ctx: &RecordContext<'_>,
    ) -> Result<Vec<TokenRecord>, ValuationError> {
        let wallets: Vec<Address> = self
            .registry
            .treasury_wallets
            .iter()
            .map(|w| w.address)
            .collect();

        let balances =
            balances_of_many(self.reader.as_ref(), meta.address, &wallets, meta.decimals, ctx.block)
                .await?;

        if balances.iter().all(|b| *b <= 0.0) {
            return Ok(Vec::new());
        }

        // Treasury-owned liquidity prices through the pool token, with the
        // multiplier set to the non-protocol share of the pool so liquid
        // backing never counts the protocol's own asset.
        let (rate_override, multiplier_override) =
            if meta.category == TokenCategory::ProtocolOwnedLiquidity {
                self.pol_overrides(meta, ctx.block).await?
            } else {
                (None, None)
            };

        let mut records = Vec::new();
        for (wallet, balance) in self.registry.treasury_wallets.iter().zip(balances) {
            if balance <= 0.0 {
                continue;
            }
            records.push(
                TokenRecord::build(
                    &self.resolver,
                    ctx,
                    meta,
                    &wallet.name,
                    wallet.address,
                    balance,
                    rate_override,
                    multiplier_override,
                )
                .await?,
            );
        }
        Ok(records)
    }

    async fn pol_overrides(
        &self,
        meta: &TokenMeta,
        block: u64,
    ) -> Result<(Option<f64>, Option<f64>), ValuationError> {
        let handler = self.registry.pair_handler(meta.address).ok_or_else(|| {
            ValuationError::Configuration(format!(
                "POL token {} has no pair handler",
                meta.symbol
            ))
        })?;

        let rate = self.resolver.pool_token_rate(handler, block).await?;

        let total = self
            .resolver
            .pool_value(handler, block, None)
            .await?
            .ok_or(ValuationError::PricingUnavailable {
                token: meta.address,
                block,
            })?;
        let excluding = self
            .resolver
            .pool_value(handler, block, Some(self.registry.protocol_token))
            .await?
            .unwrap_or(0.0);

        let multiplier = if total > 0.0 {
            (excluding / total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Ok((Some(rate), Some(multiplier)))
    }

    /// Supply adjustments for the protocol token at one block.
    async fn supply_records(
        &self,
        ctx: &RecordContext<'_>,
    ) -> Result<Vec<TokenSupply>, ValuationError> {
        let registry = &self.registry;
        let protocol = registry.protocol_token;
        let meta = registry.token_required(protocol)?;
        let reader = self.reader.as_ref();

        let mut supplies = Vec::new();

        // Minted supply: the one positive entry everything else offsets.
        let minted = total_supply(reader, protocol, meta.decimals, ctx.block).await?;
        supplies.push(TokenSupply::new(
            ctx.date,
            ctx.block,
            ctx.blockchain,
            &meta.symbol,
            protocol,
            SupplyCategory::TotalSupply,
            None,
            "total supply",
            None,
            minted,
            SupplySign::Add,
        ));

        // Protocol token sitting in treasury wallets is not circulating.
        let wallets: Vec<Address> = registry.treasury_wallets.iter().map(|w| w.address).collect();
        let wallet_balances =
            balances_of_many(reader, protocol, &wallets, meta.decimals, ctx.block).await?;
        for (wallet, balance) in registry.treasury_wallets.iter().zip(wallet_balances) {
            if balance <= 0.0 {
                continue;
            }
            supplies.push(TokenSupply::new(
                ctx.date,
                ctx.block,
                ctx.blockchain,
                &meta.symbol,
                protocol,
                SupplyCategory::Treasury,
                None,
                &wallet.name,
                Some(wallet.address),
                balance,
                SupplySign::Deduct,
            ));
        }

        // Bond contracts, offset wallets, lending markets: each venue's
        // protocol-token balance reduces the tier its category maps to.
        for venue in &registry.supply_venues {
            let balance =
                balance_of(reader, protocol, venue.address, meta.decimals, ctx.block).await?;
            if balance <= 0.0 {
                continue;
            }
            supplies.push(TokenSupply::new(
                ctx.date,
                ctx.block,
                ctx.blockchain,
                &meta.symbol,
                protocol,
                venue.category,
                None,
                &venue.name,
                Some(venue.address),
                balance,
                SupplySign::Deduct,
            ));
        }

        // The treasury's share of the protocol-token side of each owned
        // liquidity pool.
        for pol in registry
            .tokens()
            .filter(|m| m.category == TokenCategory::ProtocolOwnedLiquidity)
        {
            let Some(handler) = registry.pair_handler(pol.address) else {
                continue;
            };
            let Some(snapshot) = self.resolver.pool_snapshot(handler, ctx.block).await? else {
                continue;
            };
            let Some(protocol_in_pool) = snapshot.balance_of(protocol) else {
                continue;
            };
            if snapshot.pool_token_supply <= 0.0 || protocol_in_pool <= 0.0 {
                continue;
            }

            let lp_balances =
                balances_of_many(reader, pol.address, &wallets, pol.decimals, ctx.block).await?;
            let lp_held: f64 = lp_balances.iter().sum();
            if lp_held <= 0.0 {
                continue;
            }

            let share = (lp_held / snapshot.pool_token_supply).min(1.0);
            supplies.push(TokenSupply::new(
                ctx.date,
                ctx.block,
                ctx.blockchain,
                &meta.symbol,
                protocol,
                SupplyCategory::Liquidity,
                Some(handler.address),
                &pol.symbol,
                Some(handler.address),
                share * protocol_in_pool,
                SupplySign::Deduct,
            ));
        }

        Ok(supplies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloy::primitives::aliases::U112;
    use alloy::primitives::{address, U256};
    use alloy::sol_types::SolValue;
    use chrono::NaiveDate;
    use rustc_hash::FxHashSet;

    use crate::abis::{IERC20, IStakedToken, IUniswapV2Pair};
    use crate::chain::testing::MockReader;
    use crate::registry::{NamedAddress, PairEntry, PairHandler, PoolKind, RegistryFile, SupplyVenue, TokenMeta};

    const E9: u128 = 1_000_000_000;
    const E18: u128 = 1_000_000_000_000_000_000;

    const OHM: Address = address!("0000000000000000000000000000000000000d01");
    const GOHM: Address = address!("0000000000000000000000000000000000000d02");
    const STAKING: Address = address!("0000000000000000000000000000000000000d03");
    const WETH: Address = address!("0000000000000000000000000000000000000d04");
    const DAI: Address = address!("0000000000000000000000000000000000000d05");
    const POOL: Address = address!("0000000000000000000000000000000000000d06");
    const WALLET: Address = address!("0000000000000000000000000000000000000d07");
    const LENDING: Address = address!("0000000000000000000000000000000000000d08");

    fn fixture() -> Arc<Registry> {
        let token = |address, symbol: &str, decimals, category, is_liquid| TokenMeta {
            address,
            symbol: symbol.into(),
            decimals,
            category,
            is_liquid,
            is_volatile_bluechip: false,
            liquid_backing_multiplier: None,
            price_feed: None,
        };
        let handler = PairHandler {
            kind: PoolKind::ConstantProduct,
            address: POOL,
            pool_id: None,
            lp_token: None,
        };

        Arc::new(
            Registry::from_file(RegistryFile {
                chain: "mainnet".into(),
                protocol_token: OHM,
                staked_wrapper: GOHM,
                staking_contract: STAKING,
                wrapped_native: WETH,
                balancer_vault: None,
                tokens: vec![
                    token(OHM, "OHM", 9, TokenCategory::Volatile, false),
                    token(DAI, "DAI", 18, TokenCategory::Stable, true),
                    token(POOL, "OHM-DAI LP", 18, TokenCategory::ProtocolOwnedLiquidity, true),
                ],
                pairs: vec![PairEntry {
                    token: POOL,
                    handler: handler.clone(),
                }],
                protocol_pairs: vec![handler],
                treasury_wallets: vec![NamedAddress {
                    name: "dao wallet".into(),
                    address: WALLET,
                }],
                supply_venues: vec![SupplyVenue {
                    name: "lending market".into(),
                    address: LENDING,
                    category: SupplyCategory::Lending,
                }],
            })
            .unwrap(),
        )
    }

    fn stub_chain(mock: &mut MockReader) {
        // OHM/DAI pool: 1000 OHM against 15000 DAI, 100 LP tokens.
        mock.stub(POOL, IUniswapV2Pair::token0Call {}, OHM.abi_encode());
        mock.stub(POOL, IUniswapV2Pair::token1Call {}, DAI.abi_encode());
        mock.stub(
            POOL,
            IUniswapV2Pair::getReservesCall {},
            (U112::from(1000 * E9), U112::from(15_000 * E18), 0u32).abi_encode_params(),
        );
        mock.stub(POOL, IUniswapV2Pair::decimalsCall {}, U256::from(18u8).abi_encode());
        mock.stub(
            POOL,
            IUniswapV2Pair::totalSupplyCall {},
            U256::from(100 * E18).abi_encode(),
        );

        mock.stub(STAKING, IStakedToken::decimalsCall {}, U256::from(9u8).abi_encode());
        mock.stub(
            STAKING,
            IStakedToken::indexCall {},
            U256::from(2 * E9).abi_encode(),
        );

        mock.stub(
            OHM,
            IERC20::totalSupplyCall {},
            U256::from(1_000_000 * E9).abi_encode(),
        );
        mock.stub(
            OHM,
            IERC20::balanceOfCall { account: WALLET },
            U256::from(50_000 * E9).abi_encode(),
        );
        mock.stub(
            OHM,
            IERC20::balanceOfCall { account: LENDING },
            U256::from(5_000 * E9).abi_encode(),
        );
        mock.stub(
            DAI,
            IERC20::balanceOfCall { account: WALLET },
            U256::from(100 * E18).abi_encode(),
        );
        mock.stub(
            POOL,
            IERC20::balanceOfCall { account: WALLET },
            U256::from(50 * E18).abi_encode(),
        );
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= expected.abs() * 1e-9 + 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    #[tokio::test]
    async fn block_snapshot_aggregates_records_and_supplies() {
        let mut mock = MockReader::new(1_686_000_000);
        stub_chain(&mut mock);
        let treasury = Treasury::new(fixture(), Arc::new(mock));

        let snapshot = treasury.process_block(17_400_000).await.unwrap();
        let metrics = &snapshot.metrics;

        assert_eq!(metrics.block, 17_400_000);
        assert_eq!(metrics.date, NaiveDate::from_ymd_opt(2023, 6, 5).unwrap());
        assert_close(metrics.protocol_rate, 15.0);
        assert_close(metrics.wrapper_rate, 30.0);

        // 100 DAI + 50k OHM at $15 + 50 LP at $300.
        assert_close(metrics.market_value, 765_100.0);
        // DAI in full, POL at its non-protocol half; OHM is not liquid.
        assert_close(metrics.liquid_backing, 7_600.0);

        // 1M minted, 50k in treasury, 500 OHM owned in the pool, 5k lent out.
        assert_close(metrics.circulating_supply, 950_000.0);
        assert_close(metrics.floating_supply, 949_500.0);
        assert_close(metrics.backed_supply, 944_500.0);

        assert!(snapshot.sanity.iter().all(|c| c.passed));
    }

    #[tokio::test]
    async fn pol_record_carries_the_non_protocol_multiplier() {
        let mut mock = MockReader::new(1_686_000_000);
        stub_chain(&mut mock);
        let treasury = Treasury::new(fixture(), Arc::new(mock));

        let snapshot = treasury.process_block(17_400_000).await.unwrap();
        let pol = snapshot
            .records
            .iter()
            .find(|r| r.token == "OHM-DAI LP")
            .unwrap();

        assert_close(pol.rate, 300.0);
        assert_close(pol.balance, 50.0);
        assert_close(pol.multiplier, 0.5);
        assert_close(pol.value(), 15_000.0);
        assert_close(pol.value_excluding_ohm(), 7_500.0);
    }

    #[tokio::test]
    async fn record_identities_are_unique_within_a_block() {
        let mut mock = MockReader::new(1_686_000_000);
        stub_chain(&mut mock);
        let treasury = Treasury::new(fixture(), Arc::new(mock));

        let snapshot = treasury.process_block(17_400_000).await.unwrap();
        let ids: FxHashSet<_> = snapshot.records.iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), snapshot.records.len());
    }

    #[tokio::test]
    async fn unpriceable_protocol_token_aborts_the_block() {
        // No pool stubs at all: the protocol token has no deployed venue.
        let mut mock = MockReader::new(1_686_000_000);
        mock.stub(
            OHM,
            IERC20::totalSupplyCall {},
            U256::from(1_000_000 * E9).abi_encode(),
        );
        let treasury = Treasury::new(fixture(), Arc::new(mock));

        assert!(matches!(
            treasury.process_block(17_400_000).await,
            Err(ValuationError::PricingUnavailable { .. })
        ));
    }
}
