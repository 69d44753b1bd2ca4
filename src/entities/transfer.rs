use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::events::EventMeta;

/// Immutable log of one share transfer between accounts.
///
/// Primary Key: `{txHash}-{logIndex}`
///
/// Token amounts are the hook's position-math valuation of the moved
/// shares, not an actual token movement.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub id: String,
    pub pool: String,
    /// Sender-side position id.
    pub position: String,
    pub sender: String,
    pub receiver: String,

    pub shares: BigInt,
    pub token0_amount: BigInt,
    pub token1_amount: BigInt,
    pub amount_usd: BigDecimal,

    pub timestamp: u64,
    pub block_number: u64,
}

impl Transfer {
    pub fn new(
        pool_id: &str,
        position_id: &str,
        sender: &str,
        receiver: &str,
        shares: BigInt,
        token0_amount: BigInt,
        token1_amount: BigInt,
        amount_usd: BigDecimal,
        meta: &EventMeta,
    ) -> Self {
        Self {
            id: meta.record_id(),
            pool: pool_id.to_string(),
            position: position_id.to_string(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            shares,
            token0_amount,
            token1_amount,
            amount_usd,
            timestamp: meta.block_timestamp,
            block_number: meta.block_number,
        }
    }
}
