use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::events::EventMeta;

/// Immutable log of one withdrawal from a pool.
///
/// Primary Key: `{txHash}-{logIndex}`
#[derive(Debug, Clone)]
pub struct Withdrawal {
    pub id: String,
    pub account: String,
    pub pool: String,
    pub position: String,

    pub token0_amount: BigInt,
    pub token1_amount: BigInt,
    pub shares: BigInt,
    /// USD value of the withdrawn principal at event time.
    pub amount_usd: BigDecimal,

    pub timestamp: u64,
    pub block_number: u64,
}

impl Withdrawal {
    pub fn new(
        account: &str,
        pool_id: &str,
        position_id: &str,
        token0_amount: BigInt,
        token1_amount: BigInt,
        shares: BigInt,
        amount_usd: BigDecimal,
        meta: &EventMeta,
    ) -> Self {
        Self {
            id: meta.record_id(),
            account: account.to_string(),
            pool: pool_id.to_string(),
            position: position_id.to_string(),
            token0_amount,
            token1_amount,
            shares,
            amount_usd,
            timestamp: meta.block_timestamp,
            block_number: meta.block_number,
        }
    }
}
