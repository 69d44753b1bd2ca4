//! Hourly snapshot pass.
//!
//! Driven by event time, not wall-clock time: after applying a triggering
//! event the router asks the engine whether a full bucket has elapsed since
//! the last pass. Historical backfill therefore produces the same snapshot
//! rows as live indexing, and an idle protocol stops producing rows instead
//! of emitting empty ones.
//!
//! One pass refreshes token prices, reconciles every pool's lending yield
//! against observed balances, and captures one pool snapshot per bucket plus
//! the protocol-wide snapshot.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use log::{debug, error, info, warn};
use num_traits::{FromPrimitive, ToPrimitive, Zero};

use crate::{
    chain::{BalanceReader, PriceOracle},
    config::SnapshotSettings,
    entities::{Pool, PoolHourlySnapshot, Protocol, ProtocolHourlySnapshot, Token, PROTOCOL_ID},
    store::{EntityStore, EntityStoreExt, StoreError},
};

/// Seconds in a non-leap year.
const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Rate stored when compounding overflows f64.
const RATE_OVERFLOW_SENTINEL: f64 = 1e18;

/// Annualize the yield earned over one bucket by compounding the bucket's
/// growth factor across a year of buckets.
///
/// Degenerate inputs (no base value, zero-length bucket) annualize to zero.
pub fn annualized_rate(
    period_yield: &BigDecimal,
    initial_value: &BigDecimal,
    bucket_seconds: u64,
) -> BigDecimal {
    if initial_value <= &BigDecimal::zero() || bucket_seconds == 0 {
        error!("Cannot annualize over initial value {initial_value} and a {bucket_seconds}s bucket");
        return BigDecimal::zero();
    }
    let (Some(initial), Some(earned)) = (initial_value.to_f64(), period_yield.to_f64()) else {
        return BigDecimal::zero();
    };

    let growth = (initial + earned) / initial;
    let periods = SECONDS_PER_YEAR as f64 / bucket_seconds as f64;
    let annualized = growth.powf(periods) - 1.0;

    if !annualized.is_finite() {
        warn!("Annualized rate overflowed for period yield {period_yield}, storing the sentinel");
        return BigDecimal::from_f64(RATE_OVERFLOW_SENTINEL).unwrap_or_default();
    }
    BigDecimal::from_f64(annualized).unwrap_or_default()
}

/// Runs the hourly pass over the entity store.
pub struct SnapshotEngine {
    reader: Arc<dyn BalanceReader>,
    oracle: Arc<dyn PriceOracle>,
    bucket_seconds: u64,
}

impl SnapshotEngine {
    pub fn new(
        reader: Arc<dyn BalanceReader>,
        oracle: Arc<dyn PriceOracle>,
        settings: &SnapshotSettings,
    ) -> Self {
        Self {
            reader,
            oracle,
            bucket_seconds: settings.bucket_seconds,
        }
    }

    /// Run the pass if a full bucket has elapsed since the last one.
    /// Returns whether it ran.
    pub async fn maybe_snapshot<S: EntityStore>(
        &self,
        store: &mut S,
        block_timestamp: u64,
    ) -> Result<bool, StoreError> {
        let Some(mut protocol) = store.get_entity::<Protocol>(PROTOCOL_ID)? else {
            return Ok(false);
        };
        if block_timestamp.saturating_sub(protocol.last_snapshot_timestamp) <= self.bucket_seconds {
            return Ok(false);
        }

        let bucket = block_timestamp / self.bucket_seconds;
        debug!("Running snapshot pass for bucket {bucket} at {block_timestamp}");

        self.refresh_token_prices(store, &protocol).await?;

        let mut period_yield = BigDecimal::zero();
        for pool_id in protocol.pool_ids.clone() {
            period_yield += self.snapshot_pool(store, &pool_id, bucket).await?;
        }

        // Pool lending yield rolls up into the protocol revenue counter,
        // mirroring what the event handlers do for their own yield passes.
        protocol.cumulative_fee_usd += &period_yield;
        protocol.total_value_locked_usd += &period_yield;
        protocol.last_snapshot_timestamp = block_timestamp;

        let snapshot_id = ProtocolHourlySnapshot::id_for(&protocol.id, bucket);
        if store
            .get_entity::<ProtocolHourlySnapshot>(&snapshot_id)?
            .is_none()
        {
            let previous = match bucket.checked_sub(1) {
                Some(previous_bucket) => store.get_entity::<ProtocolHourlySnapshot>(
                    &ProtocolHourlySnapshot::id_for(&protocol.id, previous_bucket),
                )?,
                None => None,
            };
            let rate = match previous {
                Some(previous) => {
                    let earned = &protocol.cumulative_fee_usd - &previous.cumulative_fee_usd;
                    annualized_rate(
                        &earned,
                        &previous.total_value_locked_usd,
                        self.bucket_seconds,
                    )
                },
                None => BigDecimal::zero(),
            };
            store.put_entity(ProtocolHourlySnapshot::capture(&protocol, bucket, rate))?;
        }

        store.put_entity(protocol)?;
        info!("Snapshot pass complete for bucket {bucket}");
        Ok(true)
    }

    /// Re-quote every registered token and store whatever comes back, zero
    /// included.
    ///
    /// TODO: distinguish "no quoting route" from a genuine zero quote so a
    /// transient oracle outage cannot zero out a previously priced token.
    async fn refresh_token_prices<S: EntityStore>(
        &self,
        store: &mut S,
        protocol: &Protocol,
    ) -> Result<(), StoreError> {
        for token_id in &protocol.token_ids {
            let Some(mut token) = store.get_entity::<Token>(token_id)? else {
                continue;
            };
            let quoted = self.oracle.quote(&token.address, token.decimals).await;
            if quoted.is_zero() && !token.last_price_usd.is_zero() {
                warn!(
                    "Quote for {} came back zero, overwriting {}",
                    token.address, token.last_price_usd
                );
            }
            token.last_price_usd = quoted;
            store.put_entity(token)?;
        }
        Ok(())
    }

    /// Reconcile one pool's lending yield and capture its bucket snapshot.
    /// Returns the USD yield booked by this pass.
    async fn snapshot_pool<S: EntityStore>(
        &self,
        store: &mut S,
        pool_id: &str,
        bucket: u64,
    ) -> Result<BigDecimal, StoreError> {
        let Some(mut pool) = store.get_entity::<Pool>(pool_id)? else {
            warn!("Registered pool {pool_id} is missing from the store");
            return Ok(BigDecimal::zero());
        };
        let token0 = store.get_entity::<Token>(&pool.token0)?;
        let token1 = store.get_entity::<Token>(&pool.token1)?;
        let (Some(token0), Some(token1)) = (token0, token1) else {
            warn!("Pool {pool_id} is missing its tokens, skipping snapshot");
            return Ok(BigDecimal::zero());
        };

        let mut yield_usd = BigDecimal::zero();
        match self.reader.balances(&pool).await {
            Ok((observed0, observed1)) => {
                let delta0 = &observed0 - &pool.token0_amount;
                let delta1 = &observed1 - &pool.token1_amount;
                let delta_usd = token0.amount_usd(&delta0) + token1.amount_usd(&delta1);
                if delta_usd < BigDecimal::zero() {
                    warn!("Negative yield {delta_usd} reconciled for pool {pool_id}, clamping to zero");
                } else {
                    yield_usd = delta_usd;
                }
                pool.cumulative_lending_yield_usd += &yield_usd;
                pool.total_value_locked_usd += &yield_usd;
                pool.token0_amount = observed0;
                pool.token1_amount = observed1;
            },
            Err(e) => warn!("Balance read failed for pool {pool_id} during snapshot: {e}"),
        }

        // At most one capture per bucket; a replayed pass only re-runs the
        // yield reconciliation, which is a no-op right after the original.
        let snapshot_id = PoolHourlySnapshot::id_for(&pool.id, bucket);
        if store.get_entity::<PoolHourlySnapshot>(&snapshot_id)?.is_none() {
            let previous = match bucket.checked_sub(1) {
                Some(previous_bucket) => store.get_entity::<PoolHourlySnapshot>(
                    &PoolHourlySnapshot::id_for(&pool.id, previous_bucket),
                )?,
                None => None,
            };
            let rate = match previous {
                Some(previous) => {
                    let earned = (&pool.cumulative_lending_yield_usd
                        + &pool.cumulative_swap_fee_usd)
                        - (&previous.cumulative_lending_yield_usd
                            + &previous.cumulative_swap_fee_usd);
                    annualized_rate(
                        &earned,
                        &previous.total_value_locked_usd,
                        self.bucket_seconds,
                    )
                },
                None => BigDecimal::zero(),
            };
            store.put_entity(PoolHourlySnapshot::capture(&pool, bucket, rate))?;
        }

        store.put_entity(pool)?;
        Ok(yield_usd)
    }
}
