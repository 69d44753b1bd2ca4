use alloy::{
    primitives::{
        aliases::{I24, U160, U24},
        Address, U256,
    },
    providers::DynProvider,
};
use anyhow::{Context, Result};
use bigdecimal::{BigDecimal, One};

use crate::abis::erc20::IERC20;
use crate::abis::{IQuoterV2, IV4Quoter};
use crate::config::OracleSettings;
use crate::utils::{big_pow10, u256_to_bigint};

use super::{PriceOracle, RPC_CALL_TIMEOUT};

/// RPC-backed [`PriceOracle`].
///
/// Primary path sweeps the configured fee tiers through the V3-style
/// quoter; when every tier reverts, the fallback sweeps fee x tick-spacing
/// combinations through the V4 quoter with a hookless pool key. Total
/// failure quotes zero, never an error.
#[derive(Clone)]
pub struct QuoterPriceOracle {
    provider: DynProvider,
    primary_quoter: Address,
    fallback_quoter: Address,
    quote_token: Address,
    quote_decimals: u8,
    fee_tiers: Vec<u32>,
    tick_spacings: Vec<i32>,
}

impl QuoterPriceOracle {
    /// Resolves the quote token's decimals up front; quoting cannot start
    /// without them.
    pub async fn new(provider: DynProvider, settings: &OracleSettings) -> Result<Self> {
        let primary_quoter: Address = settings
            .primary_quoter
            .parse()
            .context("invalid primary quoter address")?;
        let fallback_quoter: Address = settings
            .fallback_quoter
            .parse()
            .context("invalid fallback quoter address")?;
        let quote_token: Address = settings
            .quote_token
            .parse()
            .context("invalid quote token address")?;

        let quote_contract = IERC20::new(quote_token, &provider);
        let quote_decimals =
            tokio::time::timeout(RPC_CALL_TIMEOUT, quote_contract.decimals().call())
                .await
                .context("quote token decimals call timeout")?
                .context("quote token decimals call failed")?;

        Ok(Self {
            provider,
            primary_quoter,
            fallback_quoter,
            quote_token,
            quote_decimals,
            fee_tiers: settings.fee_tiers.clone(),
            tick_spacings: settings.tick_spacings.clone(),
        })
    }

    fn to_quote_units(&self, amount_out: U256) -> BigDecimal {
        BigDecimal::from(u256_to_bigint(amount_out)) / big_pow10(self.quote_decimals as u32)
    }

    async fn quote_primary(&self, token: Address, amount_in: U256) -> Option<BigDecimal> {
        let quoter = IQuoterV2::new(self.primary_quoter, &self.provider);

        for &fee in &self.fee_tiers {
            let params = IQuoterV2::QuoteExactInputSingleParams {
                tokenIn: token,
                tokenOut: self.quote_token,
                amountIn: amount_in,
                fee: U24::from(fee),
                sqrtPriceLimitX96: U160::ZERO,
            };

            let quoted = tokio::time::timeout(
                RPC_CALL_TIMEOUT,
                quoter.quoteExactInputSingle(params).call(),
            )
            .await;

            if let Ok(Ok(result)) = quoted {
                return Some(self.to_quote_units(result.amountOut));
            }
        }

        None
    }

    async fn quote_fallback(&self, token: Address, amount_in: u128) -> Option<BigDecimal> {
        let quoter = IV4Quoter::new(self.fallback_quoter, &self.provider);

        // V4 pool keys order currencies by address.
        let (currency0, currency1) = if token < self.quote_token {
            (token, self.quote_token)
        } else {
            (self.quote_token, token)
        };
        let zero_for_one = token == currency0;

        for &fee in &self.fee_tiers {
            for &spacing in &self.tick_spacings {
                let params = IV4Quoter::QuoteExactSingleParams {
                    poolKey: IV4Quoter::PoolKey {
                        currency0,
                        currency1,
                        fee: U24::from(fee),
                        tickSpacing: I24::try_from(spacing).unwrap_or_default(),
                        hooks: Address::ZERO,
                    },
                    zeroForOne: zero_for_one,
                    exactAmount: amount_in,
                    hookData: Default::default(),
                };

                let quoted = tokio::time::timeout(
                    RPC_CALL_TIMEOUT,
                    quoter.quoteExactInputSingle(params).call(),
                )
                .await;

                if let Ok(Ok(result)) = quoted {
                    return Some(self.to_quote_units(result.amountOut));
                }
            }
        }

        None
    }
}

#[async_trait::async_trait]
impl PriceOracle for QuoterPriceOracle {
    async fn quote(&self, token: &str, decimals: u8) -> BigDecimal {
        let Ok(token_addr) = token.parse::<Address>() else {
            return BigDecimal::default();
        };

        if token_addr == self.quote_token {
            return BigDecimal::one();
        }

        // One whole token in.
        let amount_in = U256::from(10u64).pow(U256::from(decimals));

        if let Some(price) = self.quote_primary(token_addr, amount_in).await {
            return price;
        }

        let exact_amount = 10u128.checked_pow(decimals as u32).unwrap_or(0);
        if let Some(price) = self.quote_fallback(token_addr, exact_amount).await {
            return price;
        }

        BigDecimal::default()
    }
}
