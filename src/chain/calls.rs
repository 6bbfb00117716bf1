//! Typed helpers over the raw [`ChainReader`] byte interface.

use alloy::primitives::{Address, U256};
use alloy::providers::MULTICALL3_ADDRESS;
use alloy::sol_types::SolCall;
use log::debug;

use super::reader::ChainReader;
use crate::abis::{Call3, IAggregatorV3, IERC20, IMulticall3};
use crate::error::ReadError;
use crate::utils::{feed_answer_to_f64, u256_to_f64};

/// Execute a `sol!`-generated call and decode its return value.
pub async fn read<C: SolCall>(
    reader: &dyn ChainReader,
    to: Address,
    call: C,
    block: u64,
) -> Result<C::Return, ReadError> {
    let data = reader.call(to, call.abi_encode().into(), block).await?;
    C::abi_decode_returns(&data).map_err(|e| ReadError::Decode {
        address: to,
        message: e.to_string(),
    })
}

/// `balanceOf(holder)` decimal-adjusted to a token amount.
///
/// A not-yet-deployed token contributes zero balance by definition; callers
/// that need the raw distinction use [`read`] directly.
pub async fn balance_of(
    reader: &dyn ChainReader,
    token: Address,
    holder: Address,
    decimals: u8,
    block: u64,
) -> Result<f64, ReadError> {
    match read(reader, token, IERC20::balanceOfCall { account: holder }, block).await {
        Ok(raw) => Ok(u256_to_f64(raw, decimals).unwrap_or(0.0)),
        Err(e) if e.is_not_yet_deployed() => {
            debug!("token {token} not deployed at block {block}, balance 0");
            Ok(0.0)
        },
        Err(e) => Err(e),
    }
}

/// `totalSupply()` decimal-adjusted.
pub async fn total_supply(
    reader: &dyn ChainReader,
    token: Address,
    decimals: u8,
    block: u64,
) -> Result<f64, ReadError> {
    let raw = read(reader, token, IERC20::totalSupplyCall {}, block).await?;
    Ok(u256_to_f64(raw, decimals).unwrap_or(0.0))
}

/// USD rate from a Chainlink-style aggregator at `block`.
pub async fn feed_usd_rate(
    reader: &dyn ChainReader,
    feed: Address,
    block: u64,
) -> Result<Option<f64>, ReadError> {
    let decimals = read(reader, feed, IAggregatorV3::decimalsCall {}, block).await?;
    let round = read(reader, feed, IAggregatorV3::latestRoundDataCall {}, block).await?;

    let answer: i128 = round.answer.try_into().unwrap_or(-1);
    Ok(feed_answer_to_f64(answer, decimals))
}

/// Batched `balanceOf(holder)` for one token across many holders via
/// multicall3. Failed sub-calls (holder contract quirks) come back as zero.
pub async fn balances_of_many(
    reader: &dyn ChainReader,
    token: Address,
    holders: &[Address],
    decimals: u8,
    block: u64,
) -> Result<Vec<f64>, ReadError> {
    if holders.is_empty() {
        return Ok(Vec::new());
    }

    let calls: Vec<Call3> = holders
        .iter()
        .map(|holder| Call3 {
            target: token,
            allowFailure: true,
            callData: IERC20::balanceOfCall { account: *holder }
                .abi_encode()
                .into(),
        })
        .collect();

    let results = match read(
        reader,
        MULTICALL3_ADDRESS,
        IMulticall3::aggregate3Call { calls },
        block,
    )
    .await
    {
        Ok(results) => results,
        // Multicall3 itself may predate deployment on old blocks; fall back
        // to sequential reads rather than failing the batch.
        Err(e) if e.is_not_yet_deployed() => {
            let mut balances = Vec::with_capacity(holders.len());
            for holder in holders {
                balances.push(balance_of(reader, token, *holder, decimals, block).await?);
            }
            return Ok(balances);
        },
        Err(e) => return Err(e),
    };

    let mut balances = Vec::with_capacity(holders.len());
    for result in results {
        if !result.success || result.returnData.is_empty() {
            balances.push(0.0);
            continue;
        }
        let raw = IERC20::balanceOfCall::abi_decode_returns(&result.returnData)
            .unwrap_or(U256::ZERO);
        balances.push(u256_to_f64(raw, decimals).unwrap_or(0.0));
    }

    Ok(balances)
}
