//! Decoded event model.
//!
//! Raw logs are decoded once (see `chain::parser`) into this closed enum and
//! every downstream consumer matches it exhaustively, so adding an event kind
//! is a compile-time-checked change.

use num_bigint::BigInt;
use serde::Deserialize;

/// Stream position and provenance shared by every decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub tx_hash: String,
    pub log_index: u32,
}

impl EventMeta {
    /// Natural key of the event-log records derived from this event.
    pub fn record_id(&self) -> String {
        format!("{}-{}", self.tx_hash, self.log_index)
    }

    /// Stream ordering key.
    pub fn position(&self) -> (u64, u32) {
        (self.block_number, self.log_index)
    }
}

/// The closed set of event kinds the router dispatches on.
///
/// Deserializable so the snapshot trigger list can be configured
/// (`trigger_kinds: ["swap"]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    PoolCreated,
    Deposit,
    Withdraw,
    Swap,
    FeeAccrued,
    FeeCollected,
    Transfer,
    YieldSourceWithdraw,
}

/// A decoded on-chain event, ready for ledger application.
///
/// Pool-manager events carry the pool id directly; hook-emitted events carry
/// the emitting hook address and are resolved to their pool by the ledger.
/// Signed amounts keep the trader's-perspective sign convention from the
/// chain (negative = paid into the pool).
#[derive(Debug, Clone)]
pub enum PoolEvent {
    PoolCreated {
        meta: EventMeta,
        pool_id: String,
        currency0: String,
        currency1: String,
        fee: u32,
        tick_spacing: i32,
        hooks: String,
        sqrt_price_x96: BigInt,
    },
    Deposit {
        meta: EventMeta,
        hook: String,
        owner: String,
        assets0: BigInt,
        assets1: BigInt,
        shares: BigInt,
    },
    Withdraw {
        meta: EventMeta,
        hook: String,
        owner: String,
        assets0: BigInt,
        assets1: BigInt,
        shares: BigInt,
    },
    Swap {
        meta: EventMeta,
        pool_id: String,
        sender: String,
        amount0: BigInt,
        amount1: BigInt,
        sqrt_price_x96: BigInt,
        fee: u32,
    },
    FeeAccrued {
        meta: EventMeta,
        hook: String,
        fee_liquidity: BigInt,
    },
    FeeCollected {
        meta: EventMeta,
        hook: String,
        amount0: BigInt,
        amount1: BigInt,
    },
    Transfer {
        meta: EventMeta,
        hook: String,
        from: String,
        to: String,
        shares: BigInt,
    },
    YieldSourceWithdraw {
        meta: EventMeta,
        hook: String,
        amount0: BigInt,
        amount1: BigInt,
    },
}

impl PoolEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PoolEvent::PoolCreated { .. } => EventKind::PoolCreated,
            PoolEvent::Deposit { .. } => EventKind::Deposit,
            PoolEvent::Withdraw { .. } => EventKind::Withdraw,
            PoolEvent::Swap { .. } => EventKind::Swap,
            PoolEvent::FeeAccrued { .. } => EventKind::FeeAccrued,
            PoolEvent::FeeCollected { .. } => EventKind::FeeCollected,
            PoolEvent::Transfer { .. } => EventKind::Transfer,
            PoolEvent::YieldSourceWithdraw { .. } => EventKind::YieldSourceWithdraw,
        }
    }

    pub fn meta(&self) -> &EventMeta {
        match self {
            PoolEvent::PoolCreated { meta, .. }
            | PoolEvent::Deposit { meta, .. }
            | PoolEvent::Withdraw { meta, .. }
            | PoolEvent::Swap { meta, .. }
            | PoolEvent::FeeAccrued { meta, .. }
            | PoolEvent::FeeCollected { meta, .. }
            | PoolEvent::Transfer { meta, .. }
            | PoolEvent::YieldSourceWithdraw { meta, .. } => meta,
        }
    }
}
