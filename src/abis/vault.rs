//! ERC-4626 tokenized vault interface (share pricing).

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IERC4626 {
        function asset() external view returns (address);
        function decimals() external view returns (uint8);
        function convertToAssets(uint256 shares) external view returns (uint256);
    }
}
