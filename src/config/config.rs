use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::events::EventKind;

/// Chain access configuration.
///
/// The HyperSync endpoint feeds raw logs; the JSON-RPC endpoint serves the
/// deterministic contract reads (balances, quotes, token metadata).
#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    pub rpc_url: String,
    pub hypersync_url: String,
    #[serde(default)]
    pub hypersync_bearer_token: String,
    #[serde(default)]
    pub start_block: u64,
}

/// Addresses of the indexed protocol contracts.
///
/// Pool creations are accepted only for pools wired to `hook`; the pool
/// manager is the emitter of Initialize/Swap logs.
#[derive(Debug, Deserialize, Clone)]
pub struct ProtocolSettings {
    pub pool_manager: String,
    pub hook: String,
}

/// USD price quoting configuration.
///
/// The primary quoter is tried across `fee_tiers` in order; the fallback
/// quoter is tried across the fee-tier x tick-spacing cross product. The
/// quote token itself is always priced at exactly one.
#[derive(Debug, Deserialize, Clone)]
pub struct OracleSettings {
    pub primary_quoter: String,
    pub fallback_quoter: String,
    pub quote_token: String,
    #[serde(default = "default_fee_tiers")]
    pub fee_tiers: Vec<u32>,
    #[serde(default = "default_tick_spacings")]
    pub tick_spacings: Vec<i32>,
}

fn default_fee_tiers() -> Vec<u32> {
    vec![10, 100, 500, 3000, 10000]
}

fn default_tick_spacings() -> Vec<i32> {
    vec![1, 10, 60, 200]
}

/// Hourly snapshot configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotSettings {
    /// Bucket length in seconds. Snapshots are keyed by floor(timestamp / bucket).
    #[serde(default = "default_bucket_seconds")]
    pub bucket_seconds: u64,
    /// Event kinds that trigger the snapshot check after being applied.
    #[serde(default = "default_trigger_kinds")]
    pub trigger_kinds: Vec<EventKind>,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            bucket_seconds: default_bucket_seconds(),
            trigger_kinds: default_trigger_kinds(),
        }
    }
}

fn default_bucket_seconds() -> u64 {
    3600
}

fn default_trigger_kinds() -> Vec<EventKind> {
    vec![EventKind::Swap]
}

/// Root application configuration.
///
/// Loaded once at startup from `config.yaml` merged with `ACCRUE_`-prefixed
/// environment variables, and treated as immutable thereafter.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub chain: ChainSettings,
    pub protocol: ProtocolSettings,
    pub oracle: OracleSettings,
    #[serde(default)]
    pub snapshots: SnapshotSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .add_source(Environment::with_prefix("ACCRUE").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings.normalized())
    }

    /// Lowercase every configured address so they compare equal to the
    /// lowercase hex the parser emits.
    fn normalized(mut self) -> Self {
        self.protocol.pool_manager = self.protocol.pool_manager.to_lowercase();
        self.protocol.hook = self.protocol.hook.to_lowercase();
        self.oracle.primary_quoter = self.oracle.primary_quoter.to_lowercase();
        self.oracle.fallback_quoter = self.oracle.fallback_quoter.to_lowercase();
        self.oracle.quote_token = self.oracle.quote_token.to_lowercase();
        self
    }
}
