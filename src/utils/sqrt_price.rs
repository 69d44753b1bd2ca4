//! Price decoding for v4 pools.
//!
//! Converts sqrtPriceX96 values into decimal-adjusted token prices with full
//! precision (the square is taken in BigInt, never in a fixed-width integer).

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{One, Zero};
use once_cell::sync::Lazy;

use super::conversion::big_pow10;

// ============================================
// Constants
// ============================================

/// 2^192, the square of the Q64.96 scaling factor.
static Q192: Lazy<BigDecimal> = Lazy::new(|| BigDecimal::from(BigInt::from(2u32).pow(192)));

// ============================================
// sqrtPriceX96 to Price Conversion
// ============================================

/// Decode a sqrtPriceX96 into `(price0, price1)`.
///
/// `price1` is the token1-per-token0 exchange rate adjusted by
/// `10^(decimals0 - decimals1)`; `price0` is its inverse with a zero guard.
/// Degenerate inputs (non-positive sqrt price, decimals above 24) decode to
/// a pair of zeros rather than an error.
pub fn sqrt_price_x96_to_token_prices(
    sqrt_price_x96: &BigInt,
    token0_decimals: u8,
    token1_decimals: u8,
) -> (BigDecimal, BigDecimal) {
    if token0_decimals > 24 || token1_decimals > 24 {
        return (BigDecimal::zero(), BigDecimal::zero());
    }
    if sqrt_price_x96 <= &BigInt::zero() {
        return (BigDecimal::zero(), BigDecimal::zero());
    }

    // raw_price = sqrtPriceX96^2 / 2^192, squared before any scaling so the
    // uint160 square (up to 2^320) never truncates
    let squared = BigDecimal::from(sqrt_price_x96 * sqrt_price_x96);
    let raw_price = squared / &*Q192;

    let decimal_diff = token0_decimals as i32 - token1_decimals as i32;
    let price1 = if decimal_diff >= 0 {
        raw_price * big_pow10(decimal_diff as u32)
    } else {
        raw_price / big_pow10((-decimal_diff) as u32)
    };

    let price0 = safe_inverse(&price1);
    (price0, price1)
}

/// 1/value with a zero guard (zero input inverts to zero, not a panic).
fn safe_inverse(value: &BigDecimal) -> BigDecimal {
    if value <= &BigDecimal::zero() {
        BigDecimal::zero()
    } else {
        BigDecimal::one() / value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // 2^96: sqrt price of exactly 1.0 before decimal adjustment
    const ONE_X96: &str = "79228162514264337593543950336";

    #[test]
    fn test_unit_price_equal_decimals() {
        let sqrt_price = BigInt::from_str(ONE_X96).unwrap();
        let (price0, price1) = sqrt_price_x96_to_token_prices(&sqrt_price, 18, 18);
        assert_eq!(price1, BigDecimal::from(1));
        assert_eq!(price0, BigDecimal::from(1));
    }

    #[test]
    fn test_decimal_adjustment() {
        // token0 with 6 decimals vs token1 with 18: price1 scales by 10^-12
        let sqrt_price = BigInt::from_str(ONE_X96).unwrap();
        let (price0, price1) = sqrt_price_x96_to_token_prices(&sqrt_price, 6, 18);
        assert_eq!(price1, BigDecimal::from_str("0.000000000001").unwrap());
        assert_eq!(price0, BigDecimal::from(1_000_000_000_000u64));
    }

    #[test]
    fn test_zero_sqrt_price_decodes_to_zeros() {
        let (price0, price1) = sqrt_price_x96_to_token_prices(&BigInt::from(0), 18, 18);
        assert_eq!(price0, BigDecimal::zero());
        assert_eq!(price1, BigDecimal::zero());
    }

    #[test]
    fn test_out_of_range_decimals_rejected() {
        let sqrt_price = BigInt::from_str(ONE_X96).unwrap();
        let (price0, price1) = sqrt_price_x96_to_token_prices(&sqrt_price, 30, 18);
        assert_eq!(price0, BigDecimal::zero());
        assert_eq!(price1, BigDecimal::zero());
    }
}
