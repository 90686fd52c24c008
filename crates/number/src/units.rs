//! Scaling between human readable USD decimals and the ledger's 18-decimal
//! fixed-point integer representation.
//!
//! All arithmetic is exact. Values that cannot be represented without
//! rounding are rejected instead of silently truncated, which keeps
//! repeated scale/descale cycles drift free.

use {
    crate::conversions::{big_int_to_u256, u256_to_big_int},
    alloy::primitives::U256,
    bigdecimal::BigDecimal,
    num::{BigInt, bigint::Sign},
    thiserror::Error,
};

/// Number of decimals the ledger uses for all price values.
pub const PRICE_DECIMALS: i64 = 18;

#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("price must not be negative")]
    Negative,
    #[error("price has more than {PRICE_DECIMALS} fractional digits")]
    TooPrecise,
    #[error("scaled price does not fit into a uint256")]
    Overflow,
}

/// Converts a USD decimal into the ledger's fixed-point representation.
pub fn scale_usd(price: &BigDecimal) -> Result<U256, ScaleError> {
    let (digits, exponent) = price.normalized().as_bigint_and_exponent();
    if digits.sign() == Sign::Minus {
        return Err(ScaleError::Negative);
    }
    // `value == digits * 10^-exponent`, so the raw integer is
    // `digits * 10^(PRICE_DECIMALS - exponent)`.
    let shift = PRICE_DECIMALS - exponent;
    if shift < 0 {
        return Err(ScaleError::TooPrecise);
    }
    let raw = digits * BigInt::from(10u8).pow(u32::try_from(shift).map_err(|_| ScaleError::Overflow)?);
    big_int_to_u256(&raw).map_err(|_| ScaleError::Overflow)
}

/// Converts a fixed-point ledger integer back into an exact USD decimal.
pub fn descale_usd(raw: &U256) -> BigDecimal {
    BigDecimal::new(u256_to_big_int(raw), PRICE_DECIMALS).normalized()
}
