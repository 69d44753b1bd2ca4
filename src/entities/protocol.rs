use bigdecimal::BigDecimal;

/// Fixed id of the singleton protocol entity.
pub const PROTOCOL_ID: &str = "uniswap-v4-lending-hook";

/// Protocol-wide aggregate state (singleton).
///
/// Primary Key: the fixed id above
/// Query Pattern: "get global counters / enumerate pools and tokens"
#[derive(Debug, Clone)]
pub struct Protocol {
    pub id: String,
    pub name: String,

    // Monotone lifetime counters (USD)
    pub cumulative_fee_usd: BigDecimal,
    pub cumulative_volume_usd: BigDecimal,
    pub cumulative_protocol_fee_usd: BigDecimal,

    // Current aggregate state
    pub total_value_locked_usd: BigDecimal,
    pub last_snapshot_timestamp: u64,

    // Registries, so the snapshot pass can enumerate subjects
    // without a store scan
    pub pool_ids: Vec<String>,
    pub token_ids: Vec<String>,
}

impl Protocol {
    pub fn new() -> Self {
        Self {
            id: PROTOCOL_ID.to_string(),
            name: String::from("Uniswap V4 Lending Hook"),
            cumulative_fee_usd: BigDecimal::default(),
            cumulative_volume_usd: BigDecimal::default(),
            cumulative_protocol_fee_usd: BigDecimal::default(),
            total_value_locked_usd: BigDecimal::default(),
            last_snapshot_timestamp: 0,
            pool_ids: Vec::new(),
            token_ids: Vec::new(),
        }
    }

    /// Register a pool id exactly once (ids arrive lowercased).
    pub fn register_pool(&mut self, pool_id: &str) {
        if !self.pool_ids.iter().any(|id| id == pool_id) {
            self.pool_ids.push(pool_id.to_string());
        }
    }

    /// Register a token id exactly once (ids arrive lowercased).
    pub fn register_token(&mut self, token_id: &str) {
        if !self.token_ids.iter().any(|id| id == token_id) {
            self.token_ids.push(token_id.to_string());
        }
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new()
    }
}
