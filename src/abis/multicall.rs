//! Multicall3 interface for batched wallet-balance reads.
//!
//! Sub-calls run with `allowFailure` so one quirky holder contract cannot
//! fail a whole batch; callers inspect `success` per result.

use alloy::sol;

sol! {
    struct Call3 {
        address target;
        bool allowFailure;
        bytes callData;
    }

    struct McResult {
        bool success;
        bytes returnData;
    }

    #[sol(rpc)]
    interface IMulticall3 {
        function aggregate3(Call3[] calldata calls) external payable returns (McResult[] memory returnData);
    }
}
