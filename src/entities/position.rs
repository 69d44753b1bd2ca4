use num_bigint::BigInt;

use crate::events::EventMeta;

/// Builds the position id from its owning account and pool.
pub fn position_id(account: &str, pool_id: &str) -> String {
    format!("{account}-{pool_id}")
}

/// One account's share holding in one pool.
///
/// Primary Key: `{account}-{poolId}`
#[derive(Debug, Clone)]
pub struct Position {
    pub id: String,
    pub account: String,
    pub pool: String,

    pub shares: BigInt,

    pub created_at_timestamp: u64,
    pub created_at_block_number: u64,
    pub updated_at_timestamp: u64,
    pub updated_at_block_number: u64,
}

impl Position {
    /// A fresh position always starts at zero shares; the triggering
    /// handler applies its own delta afterwards.
    pub fn new(account: &str, pool_id: &str, meta: &EventMeta) -> Self {
        Self {
            id: position_id(account, pool_id),
            account: account.to_string(),
            pool: pool_id.to_string(),
            shares: BigInt::default(),
            created_at_timestamp: meta.block_timestamp,
            created_at_block_number: meta.block_number,
            updated_at_timestamp: meta.block_timestamp,
            updated_at_block_number: meta.block_number,
        }
    }

    pub fn touch(&mut self, meta: &EventMeta) {
        self.updated_at_timestamp = meta.block_timestamp;
        self.updated_at_block_number = meta.block_number;
    }
}

/// Point-in-time record of a position's share balance.
///
/// Primary Key: `{positionId}-{txHash}-{logIndex}` for per-event snapshots,
/// `{positionId}-zero` for the single synthetic baseline written when the
/// position is created (timestamped one second before its first event, so
/// charting starts from zero).
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub id: String,
    pub position: String,
    pub shares: BigInt,
    pub timestamp: u64,
    pub block_number: u64,
}

impl PositionSnapshot {
    /// Snapshot of the position as of one applied event.
    pub fn of(position: &Position, meta: &EventMeta) -> Self {
        Self {
            id: format!("{}-{}", position.id, meta.record_id()),
            position: position.id.clone(),
            shares: position.shares.clone(),
            timestamp: meta.block_timestamp,
            block_number: meta.block_number,
        }
    }

    /// The zero-shares baseline written once at position creation.
    pub fn zero_baseline(position: &Position, meta: &EventMeta) -> Self {
        Self {
            id: format!("{}-zero", position.id),
            position: position.id.clone(),
            shares: BigInt::default(),
            timestamp: meta.block_timestamp.saturating_sub(1),
            block_number: meta.block_number,
        }
    }
}
