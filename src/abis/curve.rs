//! Curve-style stable-swap pool interface.
//!
//! The LP token is sometimes the pool contract itself and sometimes a
//! separate ERC-20; the registry records which (see `PairHandler`).

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IStableSwapPool {
        function coins(uint256 i) external view returns (address);
        function balances(uint256 i) external view returns (uint256);
        function token() external view returns (address);
    }
}
