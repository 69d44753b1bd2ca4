use std::collections::HashMap;
use std::time::Duration;

use alloy::{
    providers::{DynProvider, MULTICALL3_ADDRESS},
    sol_types::SolCall,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;

use crate::abis::erc20::IERC20;
use crate::abis::{Call3, IMulticall3};
use crate::entities::Token;

use super::{TokenSource, RPC_CALL_TIMEOUT};

/// Token metadata fetcher using multicall3
#[derive(Clone)]
pub struct TokenFetcher {
    provider: DynProvider,
    /// Cache of token addresses that failed to fetch (invalid contracts, no
    /// decimals, etc.) so they are not re-probed on every pool touch.
    invalid_tokens: Cache<String, ()>,
}

/// Maximum retries for multicall
const MAX_RETRIES: u32 = 3;

/// Delay between retries (exponential backoff base)
const RETRY_DELAY_MS: u64 = 100;

impl TokenFetcher {
    pub fn new(provider: DynProvider) -> Self {
        // 10,000 capacity, 1 hour TTL: frequent lookups for known invalid
        // tokens hit cache, the TTL retries eventually in case a contract
        // appears later
        let invalid_tokens = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(3600))
            .build();

        Self {
            provider,
            invalid_tokens,
        }
    }

    /// Fetch metadata for the given addresses. Tokens that cannot be
    /// resolved (bad contract, missing or absurd decimals) are simply
    /// absent from the result and cached as invalid.
    pub async fn get_tokens(&self, addresses: &[String]) -> HashMap<String, Token> {
        let mut result = HashMap::new();

        // Filter out known invalid tokens before any lookups
        let mut candidates = Vec::with_capacity(addresses.len());
        for addr in addresses {
            if !self.invalid_tokens.contains_key(addr) {
                candidates.push(addr.clone());
            }
        }

        if candidates.is_empty() {
            return result;
        }

        let fetched = self.fetch_metadata_chunk_with_retry(&candidates).await;

        for (requested, maybe_token) in candidates.iter().zip(fetched.into_iter()) {
            if let Some(token) = maybe_token {
                result.insert(requested.clone(), token);
            } else {
                self.invalid_tokens.insert(requested.clone(), ()).await;
            }
        }

        result
    }

    /// Fetch metadata with retry logic
    async fn fetch_metadata_chunk_with_retry(&self, addresses: &[String]) -> Vec<Option<Token>> {
        for attempt in 0..MAX_RETRIES {
            match self.fetch_metadata_chunk(addresses).await {
                Ok(tokens) => return tokens,
                Err(_) => {
                    if attempt < MAX_RETRIES - 1 {
                        let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(attempt));
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }

        // All retries failed - try individual fetches as fallback
        let tasks = addresses.iter().map(|addr| self.fetch_single_token(addr));
        futures::future::join_all(tasks).await
    }

    /// Fetch a single token's metadata
    async fn fetch_single_token(&self, addr: &str) -> Option<Token> {
        let address = match addr.parse() {
            Ok(a) => a,
            Err(_) => return None,
        };

        let token_contract = IERC20::new(address, &self.provider);

        // Decimals is required - skip token if it fails (with timeout)
        let decimals =
            match tokio::time::timeout(RPC_CALL_TIMEOUT, token_contract.decimals().call()).await {
                Ok(Ok(d)) => d,
                _ => return None,
            };

        if decimals > 24 {
            return None;
        }

        let name = tokio::time::timeout(RPC_CALL_TIMEOUT, token_contract.name().call())
            .await
            .ok()
            .and_then(|r| r.ok())
            .map(|n| n.to_string())
            .unwrap_or_default();

        let symbol = tokio::time::timeout(RPC_CALL_TIMEOUT, token_contract.symbol().call())
            .await
            .ok()
            .and_then(|r| r.ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        Some(Token::new(addr.to_string(), symbol, name, decimals))
    }

    async fn fetch_metadata_chunk(&self, addresses: &[String]) -> Result<Vec<Option<Token>>> {
        let multicall = IMulticall3::new(MULTICALL3_ADDRESS, &self.provider);
        let mut calls = Vec::with_capacity(addresses.len() * 3);

        for addr in addresses {
            let address = addr.parse().context("Invalid address")?;
            let token = IERC20::new(address, &self.provider);

            // name()
            calls.push(Call3 {
                target: address,
                allowFailure: true,
                callData: token.name().calldata().to_vec().into(),
            });
            // symbol()
            calls.push(Call3 {
                target: address,
                allowFailure: true,
                callData: token.symbol().calldata().to_vec().into(),
            });
            // decimals()
            calls.push(Call3 {
                target: address,
                allowFailure: true,
                callData: token.decimals().calldata().to_vec().into(),
            });
        }

        let results = tokio::time::timeout(RPC_CALL_TIMEOUT, multicall.aggregate3(calls).call())
            .await
            .context("Multicall timeout")?
            .context("Multicall aggregate3 failed")?;

        // Vec<Option<Token>> keeps index alignment with the input addresses
        let mut tokens: Vec<Option<Token>> = Vec::with_capacity(addresses.len());

        for (i, addr) in addresses.iter().enumerate() {
            let base_idx = i * 3;
            if base_idx + 2 >= results.len() {
                tokens.push(None);
                continue;
            }

            let name_res = &results[base_idx];
            let symbol_res = &results[base_idx + 1];
            let decimals_res = &results[base_idx + 2];

            // Decimals is required - skip token if it fails
            let decimals = if decimals_res.success {
                match IERC20::decimalsCall::abi_decode_returns(&decimals_res.returnData) {
                    Ok(d) => d,
                    Err(_) => {
                        tokens.push(None);
                        continue;
                    },
                }
            } else {
                tokens.push(None);
                continue;
            };

            if decimals > 24 {
                tokens.push(None);
                continue;
            }

            let name = if name_res.success {
                IERC20::nameCall::abi_decode_returns(&name_res.returnData).unwrap_or_default()
            } else {
                String::new()
            };

            let symbol = if symbol_res.success {
                IERC20::symbolCall::abi_decode_returns(&symbol_res.returnData).unwrap_or_default()
            } else {
                String::new()
            };

            tokens.push(Some(Token::new(addr.clone(), symbol, name, decimals)));
        }

        Ok(tokens)
    }
}

#[async_trait]
impl TokenSource for TokenFetcher {
    async fn get_tokens(&self, addresses: &[String]) -> HashMap<String, Token> {
        TokenFetcher::get_tokens(self, addresses).await
    }
}
