//! Log parsing for HyperSync logs.
//!
//! Decodes raw logs into [`PoolEvent`]s once, so every downstream pass works
//! on typed data. Logs are filtered by emitting address: pool-manager events
//! are only accepted from the configured manager, hook events only from the
//! configured hook. The address check matters most for share transfers,
//! whose signature is the standard ERC-20 `Transfer` and would otherwise
//! match every token contract in the stream.

use alloy::{
    primitives::{LogData, B256, U256},
    sol_types::SolEvent,
};
use rustc_hash::FxHashMap;

use crate::abis::{
    HookDeposit, HookWithdraw, Initialize, MoneyMarketWithdrawal, ProtocolFeeAccrued,
    ProtocolFeeCollected, ShareTransfer, Swap,
};
use crate::config::ProtocolSettings;
use crate::events::{EventMeta, PoolEvent};
use crate::utils::{hex_encode, u256_to_bigint};

/// The two contract addresses this pipeline accepts logs from.
#[derive(Debug, Clone)]
pub struct LogSources {
    pub pool_manager: String,
    pub hook: String,
}

impl LogSources {
    pub fn new(protocol: &ProtocolSettings) -> Self {
        Self {
            pool_manager: protocol.pool_manager.to_lowercase(),
            hook: protocol.hook.to_lowercase(),
        }
    }
}

/// Parse HyperSync logs into typed events, preserving arrival order.
pub fn parse_logs(
    logs: impl Iterator<Item = hypersync_client::simple_types::Log>,
    block_timestamps: &FxHashMap<u64, u64>,
    sources: &LogSources,
    log_count_estimate: usize,
) -> Vec<PoolEvent> {
    let mut events: Vec<PoolEvent> = Vec::with_capacity(log_count_estimate);

    for log in logs {
        // Ignore logs without topics
        if log.topics.is_empty() {
            continue;
        }

        let data = log
            .data
            .as_ref()
            .map(|d| d.as_ref().to_vec())
            .unwrap_or_default()
            .into();

        let topics: Vec<B256> = log
            .topics
            .iter()
            .flatten()
            .map(|t| B256::from_slice(t.as_ref()))
            .collect();

        let log_data = LogData::new_unchecked(topics, data);
        let Some(topic0) = log_data.topics().first() else {
            continue;
        };

        let log_address = log
            .address
            .as_ref()
            .map(|a| hex_encode(a.as_ref()))
            .unwrap_or_default();

        let block_number: u64 = log.block_number.map(|x| x.into()).unwrap_or(0);
        let meta = EventMeta {
            block_number,
            block_timestamp: block_timestamps.get(&block_number).copied().unwrap_or(0),
            tx_hash: log
                .transaction_hash
                .as_ref()
                .map(|h| hex_encode(h.as_ref()))
                .unwrap_or_default(),
            log_index: log
                .log_index
                .map(|i| {
                    let v: u64 = i.into();
                    v as u32
                })
                .unwrap_or(0),
        };

        let from_manager = log_address == sources.pool_manager;
        let from_hook = log_address == sources.hook;

        match topic0 {
            t if t == &Initialize::SIGNATURE_HASH.0 && from_manager => {
                if let Ok(event) = Initialize::decode_log_data(&log_data) {
                    events.push(PoolEvent::PoolCreated {
                        meta,
                        pool_id: hex_encode(event.id.as_slice()),
                        currency0: hex_encode(event.currency0.as_slice()),
                        currency1: hex_encode(event.currency1.as_slice()),
                        fee: event.fee.to::<u32>(),
                        tick_spacing: event.tickSpacing.as_i32(),
                        hooks: hex_encode(event.hooks.as_slice()),
                        sqrt_price_x96: u256_to_bigint(U256::from(event.sqrtPriceX96)),
                    });
                }
            },
            t if t == &Swap::SIGNATURE_HASH.0 && from_manager => {
                if let Ok(event) = Swap::decode_log_data(&log_data) {
                    events.push(PoolEvent::Swap {
                        meta,
                        pool_id: hex_encode(event.id.as_slice()),
                        sender: hex_encode(event.sender.as_slice()),
                        amount0: event.amount0.into(),
                        amount1: event.amount1.into(),
                        sqrt_price_x96: u256_to_bigint(U256::from(event.sqrtPriceX96)),
                        fee: event.fee.to::<u32>(),
                    });
                }
            },
            t if t == &HookDeposit::SIGNATURE_HASH.0 && from_hook => {
                if let Ok(event) = HookDeposit::decode_log_data(&log_data) {
                    events.push(PoolEvent::Deposit {
                        meta,
                        hook: log_address,
                        owner: hex_encode(event.owner.as_slice()),
                        assets0: u256_to_bigint(event.assets0),
                        assets1: u256_to_bigint(event.assets1),
                        shares: u256_to_bigint(event.shares),
                    });
                }
            },
            t if t == &HookWithdraw::SIGNATURE_HASH.0 && from_hook => {
                if let Ok(event) = HookWithdraw::decode_log_data(&log_data) {
                    events.push(PoolEvent::Withdraw {
                        meta,
                        hook: log_address,
                        owner: hex_encode(event.owner.as_slice()),
                        assets0: u256_to_bigint(event.assets0),
                        assets1: u256_to_bigint(event.assets1),
                        shares: u256_to_bigint(event.shares),
                    });
                }
            },
            t if t == &ShareTransfer::SIGNATURE_HASH.0 && from_hook => {
                if let Ok(event) = ShareTransfer::decode_log_data(&log_data) {
                    events.push(PoolEvent::Transfer {
                        meta,
                        hook: log_address,
                        from: hex_encode(event.from.as_slice()),
                        to: hex_encode(event.to.as_slice()),
                        shares: u256_to_bigint(event.value),
                    });
                }
            },
            t if t == &MoneyMarketWithdrawal::SIGNATURE_HASH.0 && from_hook => {
                if let Ok(event) = MoneyMarketWithdrawal::decode_log_data(&log_data) {
                    events.push(PoolEvent::YieldSourceWithdraw {
                        meta,
                        hook: log_address,
                        amount0: u256_to_bigint(event.amount0),
                        amount1: u256_to_bigint(event.amount1),
                    });
                }
            },
            t if t == &ProtocolFeeAccrued::SIGNATURE_HASH.0 && from_hook => {
                if let Ok(event) = ProtocolFeeAccrued::decode_log_data(&log_data) {
                    events.push(PoolEvent::FeeAccrued {
                        meta,
                        hook: log_address,
                        fee_liquidity: u256_to_bigint(event.feeLiquidity),
                    });
                }
            },
            t if t == &ProtocolFeeCollected::SIGNATURE_HASH.0 && from_hook => {
                if let Ok(event) = ProtocolFeeCollected::decode_log_data(&log_data) {
                    events.push(PoolEvent::FeeCollected {
                        meta,
                        hook: log_address,
                        amount0: u256_to_bigint(event.amount0),
                        amount1: u256_to_bigint(event.amount1),
                    });
                }
            },
            _ => {},
        }
    }

    events
}
