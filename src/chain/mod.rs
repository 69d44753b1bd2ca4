//! On-chain collaborators: the read seams the ledger and snapshot engine
//! depend on (`BalanceReader`, `PriceOracle`, `TokenSource`), their
//! RPC-backed implementations, the log decoder, and the streaming event
//! feed.

mod balance_reader;
mod feed;
pub mod mock;
mod parser;
mod price_oracle;
mod token_fetcher;

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use thiserror::Error;

use crate::entities::{Pool, Token};

pub use balance_reader::OnchainBalanceReader;
pub use feed::{run_feed, FeedHandles};
pub use parser::{parse_logs, LogSources};
pub use price_oracle::QuoterPriceOracle;
pub use token_fetcher::TokenFetcher;

/// Timeout for individual RPC calls (30 seconds)
pub(crate) const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// A failed external read. Distinct from "not found" entity lookups: the
/// caller substitutes zeros and keeps going, it never aborts the event.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("rpc call failed: {0}")]
    Rpc(String),
}

/// Reads the custodial balances backing a pool.
#[async_trait]
pub trait BalanceReader: Send + Sync {
    /// Combined idle + yield-wrapped holdings of the pool's hook, per side.
    /// A reverting or absent wrapped-token probe contributes zero rather
    /// than failing the read.
    async fn balances(&self, pool: &Pool) -> Result<(BigInt, BigInt), ReadError>;

    /// Token amounts the hook values `liquidity` units at, via its
    /// position-math call.
    async fn amounts_for_liquidity(
        &self,
        pool: &Pool,
        liquidity: &BigInt,
    ) -> Result<(BigInt, BigInt), ReadError>;

    /// The hook's yield-source receipt token addresses, probed once at pool
    /// creation. `None` per side when the hook does not expose one.
    async fn yield_tokens(&self, hook: &str) -> Result<(Option<String>, Option<String>), ReadError>;
}

/// Quotes tokens against the configured quote asset.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// USD price for one whole token, or zero when no quoting path yields a
    /// usable quote. The quote asset itself is pinned to exactly one.
    async fn quote(&self, token: &str, decimals: u8) -> BigDecimal;
}

/// Supplies metadata for newly seen tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Metadata keyed by requested address. An address missing from the
    /// result failed to resolve and the caller substitutes a placeholder.
    async fn get_tokens(&self, addresses: &[String]) -> HashMap<String, Token>;
}
