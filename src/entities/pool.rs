use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::events::EventMeta;

/// A hooked pool and its running accounting state.
///
/// Primary Key: pool id (the pool manager's bytes32 id, lowercased hex)
///
/// `token0_amount` / `token1_amount` are the reserves the ledger has
/// recorded so far; the gap between them and freshly observed balances is
/// lending yield (see the deposit/withdraw/swap handlers).
#[derive(Debug, Clone)]
pub struct Pool {
    pub id: String,

    // Wiring (immutable after creation)
    pub hook: String,
    pub token0: String,
    pub token1: String,
    /// Yield-source receipt tokens held by the hook. Probed once at pool
    /// creation; a pool without them simply accrues no lending yield.
    pub a_token0: Option<String>,
    pub a_token1: Option<String>,
    pub fee: u32,
    pub tick_spacing: i32,

    // Current market state
    pub current_price: BigDecimal,

    // Share supply and recorded reserves
    pub shares: BigInt,
    pub token0_amount: BigInt,
    pub token1_amount: BigInt,

    // USD aggregates; the cumulative_* counters are monotone
    pub total_value_locked_usd: BigDecimal,
    pub cumulative_swap_fee_usd: BigDecimal,
    pub cumulative_lending_yield_usd: BigDecimal,
    pub cumulative_volume_usd: BigDecimal,
    pub unclaimed_protocol_fee_usd: BigDecimal,
    pub claimed_protocol_fee_usd: BigDecimal,

    // Last update reference
    pub created_at_timestamp: u64,
    pub created_at_block_number: u64,
    pub updated_at_timestamp: u64,
    pub updated_at_block_number: u64,
}

impl Pool {
    pub fn new(
        id: String,
        hook: String,
        token0: String,
        token1: String,
        fee: u32,
        tick_spacing: i32,
        current_price: BigDecimal,
        meta: &EventMeta,
    ) -> Self {
        Self {
            id: id.to_lowercase(),
            hook: hook.to_lowercase(),
            token0: token0.to_lowercase(),
            token1: token1.to_lowercase(),
            a_token0: None,
            a_token1: None,
            fee,
            tick_spacing,
            current_price,
            shares: BigInt::default(),
            token0_amount: BigInt::default(),
            token1_amount: BigInt::default(),
            total_value_locked_usd: BigDecimal::default(),
            cumulative_swap_fee_usd: BigDecimal::default(),
            cumulative_lending_yield_usd: BigDecimal::default(),
            cumulative_volume_usd: BigDecimal::default(),
            unclaimed_protocol_fee_usd: BigDecimal::default(),
            claimed_protocol_fee_usd: BigDecimal::default(),
            created_at_timestamp: meta.block_timestamp,
            created_at_block_number: meta.block_number,
            updated_at_timestamp: meta.block_timestamp,
            updated_at_block_number: meta.block_number,
        }
    }

    /// Stamp the last-update reference. Every mutating handler calls this.
    pub fn touch(&mut self, meta: &EventMeta) {
        self.updated_at_timestamp = meta.block_timestamp;
        self.updated_at_block_number = meta.block_number;
    }
}
