pub mod amm;
pub mod balancer;
pub mod curve;
pub mod erc20;
pub mod feed;
pub mod multicall;
pub mod staking;
pub mod vault;

pub use amm::{IUniswapV2Pair, IUniswapV3Pool};
pub use balancer::{IBalancerVault, IWeightedPool};
pub use curve::IStableSwapPool;
pub use erc20::IERC20;
pub use feed::IAggregatorV3;
pub use multicall::{Call3, IMulticall3, McResult};
pub use staking::IStakedToken;
pub use vault::IERC4626;
