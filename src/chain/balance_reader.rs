use alloy::{
    providers::{DynProvider, MULTICALL3_ADDRESS},
    sol_types::SolCall,
};
use num_bigint::BigInt;

use crate::abis::erc20::IERC20;
use crate::abis::{Call3, IHookV1, IMulticall3};
use crate::utils::{bigint_to_u256, hex_encode, signed_to_bigint, u256_to_bigint, ZERO_ADDRESS};

use super::{BalanceReader, ReadError, RPC_CALL_TIMEOUT};

/// RPC-backed [`BalanceReader`] over the hook's token holdings.
#[derive(Clone)]
pub struct OnchainBalanceReader {
    provider: DynProvider,
}

impl OnchainBalanceReader {
    pub fn new(provider: DynProvider) -> Self {
        Self { provider }
    }

    fn parse_address(&self, addr: &str) -> Result<alloy::primitives::Address, ReadError> {
        addr.parse()
            .map_err(|_| ReadError::Address(addr.to_string()))
    }
}

#[async_trait::async_trait]
impl BalanceReader for OnchainBalanceReader {
    async fn balances(&self, pool: &crate::entities::Pool) -> Result<(BigInt, BigInt), ReadError> {
        let hook = self.parse_address(&pool.hook)?;
        let multicall = IMulticall3::new(MULTICALL3_ADDRESS, &self.provider);

        // One balanceOf leg per held asset: idle token plus its wrapped
        // receipt token, both sides. Absent receipt tokens are skipped,
        // reverting legs contribute zero.
        let probes = [
            (Some(pool.token0.as_str()), 0usize),
            (pool.a_token0.as_deref(), 0),
            (Some(pool.token1.as_str()), 1),
            (pool.a_token1.as_deref(), 1),
        ];

        let mut calls = Vec::with_capacity(4);
        let mut sides = Vec::with_capacity(4);
        for (target_addr, side) in probes {
            let Some(target_addr) = target_addr else {
                continue;
            };
            let target = self.parse_address(target_addr)?;
            let token = IERC20::new(target, &self.provider);
            calls.push(Call3 {
                target,
                allowFailure: true,
                callData: token.balanceOf(hook).calldata().to_vec().into(),
            });
            sides.push(side);
        }

        let results = tokio::time::timeout(RPC_CALL_TIMEOUT, multicall.aggregate3(calls).call())
            .await
            .map_err(|_| ReadError::Rpc(String::from("balance multicall timeout")))?
            .map_err(|e| ReadError::Rpc(e.to_string()))?;

        let mut totals = [BigInt::default(), BigInt::default()];
        for (result, side) in results.iter().zip(sides) {
            if !result.success {
                continue;
            }
            if let Ok(balance) = IERC20::balanceOfCall::abi_decode_returns(&result.returnData) {
                totals[side] += u256_to_bigint(balance);
            }
        }

        let [reserve0, reserve1] = totals;
        Ok((reserve0, reserve1))
    }

    async fn amounts_for_liquidity(
        &self,
        pool: &crate::entities::Pool,
        liquidity: &BigInt,
    ) -> Result<(BigInt, BigInt), ReadError> {
        let hook = self.parse_address(&pool.hook)?;
        let contract = IHookV1::new(hook, &self.provider);

        let amounts = tokio::time::timeout(
            RPC_CALL_TIMEOUT,
            contract
                .getTokenAmountsForLiquidity(bigint_to_u256(liquidity))
                .call(),
        )
        .await
        .map_err(|_| ReadError::Rpc(String::from("position-math call timeout")))?
        .map_err(|e| ReadError::Rpc(e.to_string()))?;

        Ok((
            signed_to_bigint(&amounts.amount0),
            signed_to_bigint(&amounts.amount1),
        ))
    }

    async fn yield_tokens(
        &self,
        hook: &str,
    ) -> Result<(Option<String>, Option<String>), ReadError> {
        let hook_addr = self.parse_address(hook)?;
        let contract = IHookV1::new(hook_addr, &self.provider);

        // Optional probes: a hook without a yield source reverts here and
        // the pool simply accrues no lending yield.
        let a_token0 = tokio::time::timeout(RPC_CALL_TIMEOUT, contract.aToken0().call())
            .await
            .ok()
            .and_then(|r| r.ok())
            .map(|a| hex_encode(a.as_slice()))
            .filter(|a| a != ZERO_ADDRESS);

        let a_token1 = tokio::time::timeout(RPC_CALL_TIMEOUT, contract.aToken1().call())
            .await
            .ok()
            .and_then(|r| r.ok())
            .map(|a| hex_encode(a.as_slice()))
            .filter(|a| a != ZERO_ADDRESS);

        Ok((a_token0, a_token1))
    }
}
