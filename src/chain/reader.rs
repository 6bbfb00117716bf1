//! Historical contract-read capability.
//!
//! Everything the engine knows about the chain flows through [`ChainReader`]:
//! a read-only `eth_call` at a pinned block plus block timestamps. The
//! production implementation wraps an alloy provider; tests substitute an
//! in-memory mock.

use std::time::Duration;

use alloy::eips::BlockId;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use url::Url;

use crate::error::ReadError;

/// Timeout for individual RPC calls.
const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only contract-call capability at a specified historical block.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Execute `calldata` against `to` at `block`.
    ///
    /// A revert or empty return from a registry-known contract maps to
    /// [`ReadError::NotYetDeployed`]; transport failures map to
    /// [`ReadError::Rpc`].
    async fn call(&self, to: Address, calldata: Bytes, block: u64) -> Result<Bytes, ReadError>;

    /// Unix timestamp of `block`.
    async fn block_timestamp(&self, block: u64) -> Result<u64, ReadError>;
}

/// alloy-backed [`ChainReader`] over a single HTTP RPC endpoint.
pub struct RpcReader {
    provider: DynProvider,
}

impl RpcReader {
    pub fn new(rpc_url: &str) -> Result<Self, ReadError> {
        let url = Url::parse(rpc_url).map_err(|e| ReadError::Rpc {
            address: Address::ZERO,
            block: 0,
            message: format!("invalid rpc url: {e}"),
        })?;
        let provider = DynProvider::new(ProviderBuilder::new().connect_http(url));
        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainReader for RpcReader {
    async fn call(&self, to: Address, calldata: Bytes, block: u64) -> Result<Bytes, ReadError> {
        let tx = TransactionRequest::default().with_to(to).with_input(calldata);

        let result = tokio::time::timeout(
            RPC_CALL_TIMEOUT,
            self.provider.call(tx).block(BlockId::number(block)),
        )
        .await
        .map_err(|_| ReadError::Rpc {
            address: to,
            block,
            message: "rpc call timed out".into(),
        })?;

        match result {
            Ok(data) if data.is_empty() => Err(ReadError::NotYetDeployed { address: to, block }),
            Ok(data) => Ok(data),
            Err(e) => {
                let message = e.to_string();
                // Historical reads against a contract that does not exist yet
                // surface as reverts; that is an expected, recoverable case.
                if message.contains("revert") || message.contains("out of gas") {
                    Err(ReadError::NotYetDeployed { address: to, block })
                } else {
                    Err(ReadError::Rpc {
                        address: to,
                        block,
                        message,
                    })
                }
            },
        }
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, ReadError> {
        let header = tokio::time::timeout(
            RPC_CALL_TIMEOUT,
            self.provider.get_block(BlockId::number(block)),
        )
        .await
        .map_err(|_| ReadError::Rpc {
            address: Address::ZERO,
            block,
            message: "get_block timed out".into(),
        })?
        .map_err(|e| ReadError::Rpc {
            address: Address::ZERO,
            block,
            message: e.to_string(),
        })?;

        header
            .map(|b| b.header.timestamp)
            .ok_or_else(|| ReadError::Rpc {
                address: Address::ZERO,
                block,
                message: "block not found".into(),
            })
    }
}
