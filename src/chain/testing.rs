//! In-memory [`ChainReader`] for unit tests.
//!
//! Responses are keyed by (contract, exact calldata); anything not stubbed
//! answers `NotYetDeployed`, which is also the realistic default for a
//! contract the test never configured.

use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use rustc_hash::FxHashMap;

use super::reader::ChainReader;
use crate::error::ReadError;

pub struct MockReader {
    responses: FxHashMap<(Address, Vec<u8>), Vec<u8>>,
    broken: Vec<Address>,
    timestamp: u64,
    calls: AtomicUsize,
}

impl MockReader {
    pub fn new(timestamp: u64) -> Self {
        Self {
            responses: FxHashMap::default(),
            broken: Vec::new(),
            timestamp,
            calls: AtomicUsize::new(0),
        }
    }

    /// Make every call against `to` fail with a transport error, to test
    /// the fatal (non-NotYetDeployed) path.
    pub fn stub_rpc_failure(&mut self, to: Address) {
        self.broken.push(to);
    }

    /// Stub `call` against `to` with pre-encoded return data
    /// (`(ret,).abi_encode_params()`).
    pub fn stub<C: alloy::sol_types::SolCall>(&mut self, to: Address, call: C, return_data: Vec<u8>) {
        self.responses.insert((to, call.abi_encode()), return_data);
    }

    /// Number of `call` round trips served so far; lets tests assert that
    /// memoization actually avoided re-reads.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for MockReader {
    async fn call(&self, to: Address, calldata: Bytes, block: u64) -> Result<Bytes, ReadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(&to) {
            return Err(ReadError::Rpc {
                address: to,
                block,
                message: "connection reset".into(),
            });
        }
        self.responses
            .get(&(to, calldata.to_vec()))
            .map(|data| Bytes::from(data.clone()))
            .ok_or(ReadError::NotYetDeployed { address: to, block })
    }

    async fn block_timestamp(&self, _block: u64) -> Result<u64, ReadError> {
        Ok(self.timestamp)
    }
}
