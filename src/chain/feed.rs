//! Streaming event feed.
//!
//! A producer task streams logs from HyperSync, decodes them, and hands the
//! resulting events to the application task over a channel. The applier owns
//! the router, so ledger application stays a strictly sequential
//! single-writer pipeline; only fetching and decoding run ahead of it.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use alloy::{primitives::U256, sol_types::SolEvent};
use anyhow::{Context, Result};
use hypersync_client::{
    net_types::{BlockField, LogField, LogFilter, Query},
    Client, ClientConfig, SerializationFormat, StreamConfig,
};
use log::{error, info};
use rustc_hash::FxHashMap;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    abis::{
        HookDeposit, HookWithdraw, Initialize, MoneyMarketWithdrawal, ProtocolFeeAccrued,
        ProtocolFeeCollected, ShareTransfer, Swap,
    },
    config::Settings,
    events::PoolEvent,
    router::EventRouter,
    store::EntityStore,
};

use super::parser::{parse_logs, LogSources};

/// Interval for logging progress updates (10 seconds)
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Timeout for receiving data from HyperSync stream (5 minutes)
/// If no data is received within this time, reconnect the stream
const STREAM_RECV_TIMEOUT: Duration = Duration::from_secs(300);

/// Delay before re-opening the stream once it drains at the tip
const TIP_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Channel capacity between the stream producer and the applier
const FEED_BUFFER: usize = 1024;

/// Join handles for the two feed tasks.
pub struct FeedHandles {
    pub producer: JoinHandle<Result<()>>,
    pub applier: JoinHandle<()>,
}

/// Spawn the producer and applier tasks.
pub fn run_feed<S>(
    settings: &Settings,
    router: EventRouter<S>,
    shutdown: CancellationToken,
) -> Result<FeedHandles>
where
    S: EntityStore + Send + 'static,
{
    let url = settings
        .chain
        .hypersync_url
        .parse()
        .context("Invalid HyperSync URL")?;

    let client_config = ClientConfig {
        serialization_format: SerializationFormat::CapnProto {
            should_cache_queries: false,
        },
        http_req_timeout_millis: 120_000,
        url,
        api_token: settings.chain.hypersync_bearer_token.clone(),
        max_num_retries: 5,
        ..Default::default()
    };

    let client = Arc::new(Client::new(client_config).context("Failed to create HyperSync client")?);

    let filters = LogFilter::all().and_topic0([
        Initialize::SIGNATURE_HASH.0,
        Swap::SIGNATURE_HASH.0,
        HookDeposit::SIGNATURE_HASH.0,
        HookWithdraw::SIGNATURE_HASH.0,
        ShareTransfer::SIGNATURE_HASH.0,
        MoneyMarketWithdrawal::SIGNATURE_HASH.0,
        ProtocolFeeAccrued::SIGNATURE_HASH.0,
        ProtocolFeeCollected::SIGNATURE_HASH.0,
    ])?;

    let sources = LogSources::new(&settings.protocol);
    let start_block = settings.chain.start_block;

    let (sender, receiver) = mpsc::channel(FEED_BUFFER);

    let producer = tokio::spawn(stream_logs(
        client,
        start_block,
        filters,
        sources,
        sender,
        shutdown.clone(),
    ));
    let applier = tokio::spawn(apply_events(router, receiver, shutdown));

    Ok(FeedHandles { producer, applier })
}

async fn stream_logs(
    client: Arc<Client>,
    start_block: u64,
    filters: LogFilter,
    sources: LogSources,
    sender: mpsc::Sender<PoolEvent>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut next_from_block = start_block;
    let mut last_progress_log = Instant::now();

    loop {
        if shutdown.is_cancelled() {
            info!("Event feed received cancellation signal");
            break;
        }

        let query = Query::new()
            .from_block(next_from_block)
            .where_logs(filters.clone())
            .select_block_fields([BlockField::Number, BlockField::Timestamp])
            .select_log_fields([
                LogField::BlockNumber,
                LogField::TransactionHash,
                LogField::LogIndex,
                LogField::Address,
                LogField::Data,
                LogField::Topic0,
                LogField::Topic1,
                LogField::Topic2,
                LogField::Topic3,
            ]);

        let mut stream = client.stream(query, StreamConfig::default()).await?;

        while let Some(res) = tokio::time::timeout(STREAM_RECV_TIMEOUT, stream.recv())
            .await
            .map_err(|_| anyhow::anyhow!("Stream recv timeout after {:?}", STREAM_RECV_TIMEOUT))?
        {
            let res = res.context("Stream error")?;

            // Block timestamps for the log batch
            let block_timestamps: FxHashMap<u64, u64> = res
                .data
                .blocks
                .iter()
                .flatten()
                .filter_map(|b| {
                    let n = b.number?;
                    let t = U256::from_be_slice(b.timestamp.as_ref()?).to::<u64>();
                    Some((n, t))
                })
                .collect();

            let log_count_estimate = res.data.logs.iter().flatten().count();

            let mut events = parse_logs(
                res.data.logs.into_iter().flatten(),
                &block_timestamps,
                &sources,
                log_count_estimate,
            );

            // The application contract is strict (block, log index) order;
            // re-sort here in case the batch arrives grouped differently.
            events.sort_by_key(|event| event.meta().position());

            for event in events {
                if sender.send(event).await.is_err() {
                    // Applier is gone, nothing left to feed.
                    return Ok(());
                }
            }

            next_from_block = res.next_block;

            if last_progress_log.elapsed() >= PROGRESS_LOG_INTERVAL {
                info!("Feed synced to block {next_from_block}");
                last_progress_log = Instant::now();
            }

            if shutdown.is_cancelled() {
                break;
            }
        }

        // Stream drained at the tip; poll again shortly.
        tokio::time::sleep(TIP_POLL_INTERVAL).await;
    }

    Ok(())
}

async fn apply_events<S>(
    mut router: EventRouter<S>,
    mut receiver: mpsc::Receiver<PoolEvent>,
    shutdown: CancellationToken,
) where
    S: EntityStore + Send,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Event applier received cancellation signal");
                break;
            },
            maybe_event = receiver.recv() => {
                let Some(event) = maybe_event else {
                    break;
                };
                // No event failure is fatal; the worst outcome is a skipped
                // update, surfaced in the log.
                if let Err(e) = router.dispatch(event).await {
                    error!("Failed to apply event: {e:?}");
                }
            },
        }
    }
}
