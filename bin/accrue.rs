use std::sync::Arc;

use alloy::providers::{DynProvider, ProviderBuilder};
use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;
use url::Url;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use accrue::{
    run_feed, BalanceReader, EventRouter, Ledger, MemoryStore, OnchainBalanceReader, PriceOracle,
    QuoterPriceOracle, Settings, SnapshotEngine, TokenFetcher, TokenSource,
};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    // Load configuration
    let settings = Settings::new()
        .context("Failed to load config.yaml. Please ensure it exists and is valid")?;

    let rpc_url = Url::parse(&settings.chain.rpc_url).context("Invalid RPC URL")?;
    let provider = DynProvider::new(ProviderBuilder::new().connect_http(rpc_url));

    // The chain read seams, all backed by the same RPC provider
    let reader: Arc<dyn BalanceReader> = Arc::new(OnchainBalanceReader::new(provider.clone()));
    let oracle: Arc<dyn PriceOracle> = Arc::new(
        QuoterPriceOracle::new(provider.clone(), &settings.oracle)
            .await
            .context("Failed to initialize the price oracle")?,
    );
    let tokens: Arc<dyn TokenSource> = Arc::new(TokenFetcher::new(provider));

    let ledger = Ledger::new(
        MemoryStore::new(),
        reader.clone(),
        oracle.clone(),
        tokens,
        &settings.protocol.hook,
    );
    let engine = SnapshotEngine::new(reader, oracle, &settings.snapshots);
    let router = EventRouter::new(ledger, engine, settings.snapshots.trigger_kinds.clone());

    let cancellation_token = CancellationToken::new();

    let handles = run_feed(&settings, router, cancellation_token.clone())
        .context("Failed to start the event feed")?;

    info!("Event feed started from block {}", settings.chain.start_block);

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    // Set up graceful shutdown signal handler
    info!("Indexer running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    // Cancel all running tasks
    info!("Finishing all tasks...");

    cancellation_token.cancel();

    // Wait for the stream producer to stop
    info!("Waiting for the event feed to stop...");
    if let Ok(Err(e)) = handles.producer.await {
        error!("Event feed failed: {:#}", e);
    }

    // Wait for the applier to drain
    info!("Waiting for the event applier to stop...");
    let _ = handles.applier.await;

    info!("All tasks stopped");
    Ok(())
}
