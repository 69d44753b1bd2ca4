use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::utils::big_pow10;

/// Token metadata and the price last observed through the quoter.
///
/// Primary Key: address
#[derive(Debug, Clone)]
pub struct Token {
    pub address: String,

    // On-chain metadata (immutable after first fetch)
    pub symbol: String,
    pub name: String,
    pub decimals: u8,

    // Refreshed during the snapshot pass; the quote token is pinned to 1
    pub last_price_usd: BigDecimal,
}

impl Token {
    pub fn new(address: String, symbol: String, name: String, decimals: u8) -> Self {
        Self {
            // Always lowercase addresses for consistent comparisons
            address: address.to_lowercase(),
            symbol,
            name,
            decimals,
            last_price_usd: BigDecimal::default(),
        }
    }

    /// USD value of a raw token amount at the last observed price.
    ///
    /// The amount keeps its sign, so negative deltas value negative.
    pub fn amount_usd(&self, amount: &BigInt) -> BigDecimal {
        let adjusted = BigDecimal::from(amount.clone()) / big_pow10(self.decimals as u32);
        adjusted * &self.last_price_usd
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn amount_usd_adjusts_by_decimals() {
        let mut token = Token::new(
            String::from("0xAAAA000000000000000000000000000000000001"),
            String::from("USDC"),
            String::from("USD Coin"),
            6,
        );
        token.last_price_usd = BigDecimal::from(1);

        let amount = BigInt::from(2_500_000u64);
        assert_eq!(
            token.amount_usd(&amount),
            BigDecimal::from_str("2.5").unwrap()
        );
        assert_eq!(token.address, "0xaaaa000000000000000000000000000000000001");
    }

    #[test]
    fn amount_usd_keeps_sign() {
        let mut token = Token::new(
            String::from("0x0000000000000000000000000000000000000002"),
            String::from("WETH"),
            String::from("Wrapped Ether"),
            18,
        );
        token.last_price_usd = BigDecimal::from(2000);

        let amount = BigInt::from(-1_000_000_000_000_000_000i128);
        assert_eq!(token.amount_usd(&amount), BigDecimal::from(-2000));
    }
}
