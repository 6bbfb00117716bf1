//! Balancer V2 weighted pool interfaces.
//!
//! Token balances live in the shared vault and are fetched by pool id;
//! weights and pool-token supply come from the pool contract itself.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IBalancerVault {
        function getPoolTokens(bytes32 poolId) external view returns (address[] tokens, uint256[] balances, uint256 lastChangeBlock);
    }

    #[sol(rpc)]
    interface IWeightedPool {
        function getPoolId() external view returns (bytes32);
        function getNormalizedWeights() external view returns (uint256[]);
        function totalSupply() external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}
