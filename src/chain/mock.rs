//! Mock chain collaborators for testing without network calls.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use crate::entities::{Pool, Token};

use super::{BalanceReader, PriceOracle, ReadError, TokenSource};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock balance reader returning scripted balances.
///
/// Balances are keyed by pool id and can be re-scripted mid-test with
/// `set_balances` to play out a sequence of observations.
#[derive(Debug, Clone, Default)]
pub struct MockBalanceReader {
    balances: Arc<Mutex<FxHashMap<String, (BigInt, BigInt)>>>,
    /// Fixed per-pool override for `amounts_for_liquidity`; without one the
    /// mock values liquidity 1:1 on both sides.
    amounts: Arc<Mutex<FxHashMap<String, (BigInt, BigInt)>>>,
    yield_tokens: Arc<Mutex<FxHashMap<String, (Option<String>, Option<String>)>>>,
    fail_reads: Arc<Mutex<bool>>,
}

impl MockBalanceReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the observed reserves for a pool.
    pub fn with_balances(self, pool_id: &str, reserve0: BigInt, reserve1: BigInt) -> Self {
        self.set_balances(pool_id, reserve0, reserve1);
        self
    }

    /// Script the position-math valuation for a pool.
    pub fn with_amounts_for_liquidity(
        self,
        pool_id: &str,
        amount0: BigInt,
        amount1: BigInt,
    ) -> Self {
        locked(&self.amounts).insert(pool_id.to_string(), (amount0, amount1));
        self
    }

    /// Script the yield-source receipt tokens for a hook.
    pub fn with_yield_tokens(
        self,
        hook: &str,
        a_token0: Option<String>,
        a_token1: Option<String>,
    ) -> Self {
        locked(&self.yield_tokens).insert(hook.to_string(), (a_token0, a_token1));
        self
    }

    /// Make every read fail until reset; for exercising the
    /// substitute-zeros path.
    pub fn with_failing_reads(self) -> Self {
        self.set_failing_reads(true);
        self
    }

    /// Re-script the observed reserves mid-test.
    pub fn set_balances(&self, pool_id: &str, reserve0: BigInt, reserve1: BigInt) {
        locked(&self.balances).insert(pool_id.to_string(), (reserve0, reserve1));
    }

    pub fn set_failing_reads(&self, fail: bool) {
        *locked(&self.fail_reads) = fail;
    }
}

#[async_trait]
impl BalanceReader for MockBalanceReader {
    async fn balances(&self, pool: &Pool) -> Result<(BigInt, BigInt), ReadError> {
        if *locked(&self.fail_reads) {
            return Err(ReadError::Rpc(String::from("scripted failure")));
        }
        Ok(locked(&self.balances)
            .get(&pool.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn amounts_for_liquidity(
        &self,
        pool: &Pool,
        liquidity: &BigInt,
    ) -> Result<(BigInt, BigInt), ReadError> {
        if *locked(&self.fail_reads) {
            return Err(ReadError::Rpc(String::from("scripted failure")));
        }
        if let Some(fixed) = locked(&self.amounts).get(&pool.id) {
            return Ok(fixed.clone());
        }
        Ok((liquidity.clone(), liquidity.clone()))
    }

    async fn yield_tokens(
        &self,
        hook: &str,
    ) -> Result<(Option<String>, Option<String>), ReadError> {
        if *locked(&self.fail_reads) {
            return Err(ReadError::Rpc(String::from("scripted failure")));
        }
        Ok(locked(&self.yield_tokens)
            .get(hook)
            .cloned()
            .unwrap_or((None, None)))
    }
}

/// Mock price oracle returning scripted per-token prices, zero otherwise.
#[derive(Debug, Clone, Default)]
pub struct MockPriceOracle {
    prices: Arc<Mutex<FxHashMap<String, BigDecimal>>>,
}

impl MockPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, token: &str, price: BigDecimal) -> Self {
        self.set_price(token, price);
        self
    }

    pub fn set_price(&self, token: &str, price: BigDecimal) {
        locked(&self.prices).insert(token.to_lowercase(), price);
    }
}

#[async_trait]
impl PriceOracle for MockPriceOracle {
    async fn quote(&self, token: &str, _decimals: u8) -> BigDecimal {
        locked(&self.prices)
            .get(&token.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}

/// Mock token source returning scripted metadata; unscripted addresses stay
/// unresolved, exercising the placeholder path.
#[derive(Debug, Clone, Default)]
pub struct MockTokenSource {
    tokens: Arc<Mutex<FxHashMap<String, Token>>>,
}

impl MockTokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: Token) -> Self {
        locked(&self.tokens).insert(token.address.clone(), token);
        self
    }
}

#[async_trait]
impl TokenSource for MockTokenSource {
    async fn get_tokens(&self, addresses: &[String]) -> HashMap<String, Token> {
        let scripted = locked(&self.tokens);
        addresses
            .iter()
            .filter_map(|address| {
                let token = scripted.get(&address.to_lowercase())?;
                Some((address.clone(), token.clone()))
            })
            .collect()
    }
}
