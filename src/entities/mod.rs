//! Entity model: the typed state the ledger reads and writes through the
//! store contract. One file per entity kind.

mod account;
mod deposit;
mod pool;
mod position;
mod protocol;
mod snapshot;
mod swap;
mod token;
mod transfer;
mod withdraw;

pub use account::Account;
pub use deposit::Deposit;
pub use pool::Pool;
pub use position::{position_id, Position, PositionSnapshot};
pub use protocol::{Protocol, PROTOCOL_ID};
pub use snapshot::{PoolHourlySnapshot, ProtocolHourlySnapshot};
pub use swap::Swap;
pub use token::Token;
pub use transfer::Transfer;
pub use withdraw::Withdrawal;
