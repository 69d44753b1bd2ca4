//! Utility functions for the accrue indexer.
//!
//! This module is organized into focused submodules:
//!
//! - [`conversion`] - Type conversions (U256/signed ints to BigInt, hex encoding)
//! - [`sqrt_price`] - sqrtPriceX96 decoding into token prices

mod conversion;
mod sqrt_price;

// ============================================
// Common Constants
// ============================================

/// The Ethereum zero address (0x0000000000000000000000000000000000000000)
/// Used as the mint/burn endpoint marker on share transfers.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

// ============================================
// Re-exports
// ============================================

// Conversion utilities
pub use conversion::{bigint_to_u256, hex_encode, signed_to_bigint, u256_to_bigint};

pub(crate) use conversion::big_pow10;

// Price conversion utilities
pub use sqrt_price::sqrt_price_x96_to_token_prices;
