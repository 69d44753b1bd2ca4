//! Lending-hook contract surface: share accounting events plus the view
//! functions the indexer reads (aToken addresses, position math).
//!
//! The share `Transfer` event deliberately matches the ERC-20 signature;
//! only logs emitted by the hook itself are treated as share transfers.

use alloy::sol;

sol! {
    event Deposit(address indexed sender, address indexed owner, uint256 assets0, uint256 assets1, uint256 shares);
    event Withdraw(address indexed sender, address indexed receiver, address indexed owner, uint256 assets0, uint256 assets1, uint256 shares);
    event Transfer(address indexed from, address indexed to, uint256 value);
    event MoneyMarketWithdrawal(uint256 amount0, uint256 amount1);
    event ProtocolFeeAccrued(uint256 feeLiquidity);
    event ProtocolFeeCollected(uint256 amount0, uint256 amount1);

    #[sol(rpc)]
    interface IHookV1 {
        function aToken0() external view returns (address);
        function aToken1() external view returns (address);
        function getTokenAmountsForLiquidity(uint256 liquidity) external view returns (int256 amount0, int256 amount1);
    }
}
