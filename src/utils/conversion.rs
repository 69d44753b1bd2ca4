//! Type conversion and formatting utilities.
//!
//! Functions for moving between alloy's fixed-width chain integers and the
//! arbitrary-precision types the ledger accounts in (BigInt, BigDecimal).

use alloy::primitives::{hex, Signed, U256};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use once_cell::sync::Lazy;
use std::str::FromStr;

// ============================================
// Hex Encoding
// ============================================

/// Encode bytes as a lowercase hex string with 0x prefix.
pub fn hex_encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ============================================
// Chain Integer Conversions
// ============================================

/// Convert alloy U256 to BigInt via its little-endian bytes
/// (faster than string parsing).
pub fn u256_to_bigint(value: U256) -> BigInt {
    let bytes: [u8; 32] = value.to_le_bytes();
    BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes)
}

/// Convert any alloy signed integer (int24/int128/int256, ...) to BigInt.
///
/// Goes through the decimal string form, which is exact for every width and
/// avoids per-width byte handling.
pub fn signed_to_bigint<const BITS: usize, const LIMBS: usize>(
    value: &Signed<BITS, LIMBS>,
) -> BigInt {
    BigInt::from_str(&value.to_string()).unwrap_or_default()
}

/// Convert a BigInt back to U256 for contract call arguments.
///
/// Share amounts fit comfortably; negative values clamp to zero and
/// overflow saturates rather than wrapping.
pub fn bigint_to_u256(value: &BigInt) -> U256 {
    if value.sign() == num_bigint::Sign::Minus {
        return U256::ZERO;
    }
    let (_, bytes) = value.to_bytes_le();
    if bytes.len() > 32 {
        return U256::MAX;
    }
    U256::from_le_slice(&bytes)
}

// ============================================
// Internal Helpers
// ============================================

static POW10_CACHE: Lazy<[BigDecimal; 25]> =
    Lazy::new(|| std::array::from_fn(|i| BigDecimal::from(BigInt::from(10u32).pow(i as u32))));

/// Compute 10^exp as BigDecimal.
pub(crate) fn big_pow10(exp: u32) -> BigDecimal {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigDecimal::from(BigInt::from(10u32).pow(exp))
    }
}
