pub mod abis;
pub mod chain;
pub mod config;
pub mod entities;
pub mod events;
pub mod ledger;
pub mod router;
pub mod snapshot;
pub mod store;
pub mod utils;

pub use chain::{
    run_feed, BalanceReader, FeedHandles, OnchainBalanceReader, PriceOracle, QuoterPriceOracle,
    TokenFetcher, TokenSource,
};
pub use config::Settings;
pub use events::{EventKind, PoolEvent};
pub use ledger::Ledger;
pub use router::EventRouter;
pub use snapshot::SnapshotEngine;
pub use store::{EntityStore, MemoryStore};
