pub mod erc20;
pub mod hook;
pub mod manager;
pub mod multicall;
pub mod quoter;

pub use erc20::IERC20;
pub use hook::{
    Deposit as HookDeposit, IHookV1, MoneyMarketWithdrawal, ProtocolFeeAccrued,
    ProtocolFeeCollected, Transfer as ShareTransfer, Withdraw as HookWithdraw,
};
pub use manager::{Initialize, Swap};
pub use multicall::{Call3, IMulticall3, McResult};
pub use quoter::{IQuoterV2, IV4Quoter};
