//! Error taxonomy for the valuation pipeline.
//!
//! The split that matters is recoverable vs. fatal:
//!
//! - [`ReadError::NotYetDeployed`]: a call reverted because the contract does
//!   not exist at the queried historical block. Swallowed at the lowest level
//!   (missing pool snapshot, zero balance) and never propagated.
//! - Everything else aborts the block. In particular a token with no pricing
//!   route is a hard error, never a silent `0.0`; a zero rate would
//!   understate treasury value undetectably.

use alloy::primitives::Address;
use thiserror::Error;

/// Failure modes of a single historical contract read.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The call reverted or returned empty data at the queried block, which
    /// for registry-known contracts means "not deployed yet".
    #[error("contract {address} not deployed at block {block}")]
    NotYetDeployed { address: Address, block: u64 },

    /// Transport-level or otherwise unexpected RPC failure.
    #[error("rpc call to {address} at block {block} failed: {message}")]
    Rpc {
        address: Address,
        block: u64,
        message: String,
    },

    /// Returned bytes did not decode as the expected ABI type.
    #[error("failed to decode response from {address}: {message}")]
    Decode { address: Address, message: String },
}

impl ReadError {
    pub fn is_not_yet_deployed(&self) -> bool {
        matches!(self, ReadError::NotYetDeployed { .. })
    }
}

/// Fatal errors of the per-block valuation pipeline.
#[derive(Debug, Error)]
pub enum ValuationError {
    /// No route (feed, peg shortcut, or pair handler) resolves this token.
    #[error("no pricing route for token {token} at block {block}")]
    PricingUnavailable { token: Address, block: u64 },

    /// Static registry is inconsistent (missing entry, malformed address,
    /// pricing cycle, bad pool wiring).
    #[error("registry configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Read(#[from] ReadError),
}
