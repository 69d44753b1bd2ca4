use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::events::EventMeta;

/// Immutable log of one swap through a pool.
///
/// Primary Key: `{txHash}-{logIndex}`
///
/// Amounts keep the signed trader's-perspective convention from the chain.
#[derive(Debug, Clone)]
pub struct Swap {
    pub id: String,
    pub pool: String,
    pub sender: String,

    pub amount0: BigInt,
    pub amount1: BigInt,
    /// Fee rate in parts per million at the time of the swap.
    pub fee: u32,
    /// Extracted fee (output leg x rate) valued in USD.
    pub fee_usd: BigDecimal,
    /// Positive magnitude of the output leg valued in USD.
    pub volume_usd: BigDecimal,

    pub timestamp: u64,
    pub block_number: u64,
}

impl Swap {
    pub fn new(
        pool_id: &str,
        sender: &str,
        amount0: BigInt,
        amount1: BigInt,
        fee: u32,
        fee_usd: BigDecimal,
        volume_usd: BigDecimal,
        meta: &EventMeta,
    ) -> Self {
        Self {
            id: meta.record_id(),
            pool: pool_id.to_string(),
            sender: sender.to_string(),
            amount0,
            amount1,
            fee,
            fee_usd,
            volume_usd,
            timestamp: meta.block_timestamp,
            block_number: meta.block_number,
        }
    }
}
