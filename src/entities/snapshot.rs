use bigdecimal::BigDecimal;

use super::{Pool, Protocol};

/// Hourly capture of one pool's counters.
///
/// Primary Key: `{poolId}-{bucket}`, where bucket = timestamp / bucket
/// seconds. Keying by bucket makes the capture idempotent within an hour.
#[derive(Debug, Clone)]
pub struct PoolHourlySnapshot {
    pub id: String,
    pub pool: String,
    pub bucket: u64,

    pub current_price: BigDecimal,
    pub total_value_locked_usd: BigDecimal,
    pub cumulative_swap_fee_usd: BigDecimal,
    pub cumulative_lending_yield_usd: BigDecimal,
    pub cumulative_volume_usd: BigDecimal,
    pub shares: num_bigint::BigInt,

    /// Annualized yield rate over the previous bucket, zero when no
    /// previous bucket exists.
    pub rate: BigDecimal,
}

impl PoolHourlySnapshot {
    pub fn id_for(pool_id: &str, bucket: u64) -> String {
        format!("{pool_id}-{bucket}")
    }

    pub fn capture(pool: &Pool, bucket: u64, rate: BigDecimal) -> Self {
        Self {
            id: Self::id_for(&pool.id, bucket),
            pool: pool.id.clone(),
            bucket,
            current_price: pool.current_price.clone(),
            total_value_locked_usd: pool.total_value_locked_usd.clone(),
            cumulative_swap_fee_usd: pool.cumulative_swap_fee_usd.clone(),
            cumulative_lending_yield_usd: pool.cumulative_lending_yield_usd.clone(),
            cumulative_volume_usd: pool.cumulative_volume_usd.clone(),
            shares: pool.shares.clone(),
            rate,
        }
    }
}

/// Hourly capture of the protocol-wide counters.
///
/// Primary Key: `{protocolId}-{bucket}`
#[derive(Debug, Clone)]
pub struct ProtocolHourlySnapshot {
    pub id: String,
    pub protocol: String,
    pub bucket: u64,

    pub cumulative_fee_usd: BigDecimal,
    pub cumulative_volume_usd: BigDecimal,
    pub cumulative_protocol_fee_usd: BigDecimal,
    pub total_value_locked_usd: BigDecimal,

    /// Annualized rate over the previous bucket, zero when no previous
    /// bucket exists.
    pub rate: BigDecimal,
}

impl ProtocolHourlySnapshot {
    pub fn id_for(protocol_id: &str, bucket: u64) -> String {
        format!("{protocol_id}-{bucket}")
    }

    pub fn capture(protocol: &Protocol, bucket: u64, rate: BigDecimal) -> Self {
        Self {
            id: Self::id_for(&protocol.id, bucket),
            protocol: protocol.id.clone(),
            bucket,
            cumulative_fee_usd: protocol.cumulative_fee_usd.clone(),
            cumulative_volume_usd: protocol.cumulative_volume_usd.clone(),
            cumulative_protocol_fee_usd: protocol.cumulative_protocol_fee_usd.clone(),
            total_value_locked_usd: protocol.total_value_locked_usd.clone(),
            rate,
        }
    }
}
