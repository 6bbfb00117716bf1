//! Rebasing-wrapper interface for the protocol's staked asset.
//!
//! `index()` returns the cumulative rebase index scaled to the staked
//! token's decimals (one wrapper token = index() underlying tokens).

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IStakedToken {
        function index() external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}
