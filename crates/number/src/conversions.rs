use {
    alloy::primitives::U256,
    anyhow::{Context, Result, ensure},
    bigdecimal::{BigDecimal, num_bigint::ToBigInt},
    num::{BigInt, BigUint, bigint::Sign},
};

pub fn u256_to_big_uint(input: &U256) -> BigUint {
    BigUint::from_bytes_be(&input.to_be_bytes::<32>())
}

pub fn u256_to_big_int(input: &U256) -> BigInt {
    BigInt::from_biguint(Sign::Plus, u256_to_big_uint(input))
}

pub fn u256_to_big_decimal(input: &U256) -> BigDecimal {
    BigDecimal::from(u256_to_big_int(input))
}

pub fn big_uint_to_u256(input: &BigUint) -> Result<U256> {
    let bytes = input.to_bytes_be();
    ensure!(bytes.len() <= 32, "too large");
    Ok(U256::from_be_slice(&bytes))
}

pub fn big_int_to_u256(input: &BigInt) -> Result<U256> {
    ensure!(input.sign() != Sign::Minus, "negative");
    big_uint_to_u256(input.magnitude())
}

/// Converts an integral decimal to a U256. Fails on fractional values so
/// that callers never lose precision silently.
pub fn big_decimal_to_u256(input: &BigDecimal) -> Result<U256> {
    ensure!(input.is_integer(), "not an integer");
    let big_int = input
        .to_bigint()
        .context("big decimal is not convertible to big int")?;
    big_int_to_u256(&big_int)
}

#[cfg(test)]
mod tests {
    use {super::*, std::str::FromStr};

    #[test]
    fn u256_to_big_int_and_back() {
        for val in ["0", "42", "1337", "1000000000000000000"] {
            let u256 = U256::from_str(val).unwrap();
            assert_eq!(big_int_to_u256(&u256_to_big_int(&u256)).unwrap(), u256);
        }
    }

    #[test]
    fn u256_max_round_trips() {
        let max = U256::MAX;
        assert_eq!(big_uint_to_u256(&u256_to_big_uint(&max)).unwrap(), max);
    }

    #[test]
    fn negative_big_int_is_rejected() {
        assert!(big_int_to_u256(&BigInt::from(-1)).is_err());
    }

    #[test]
    fn too_large_big_uint_is_rejected() {
        let too_large = u256_to_big_uint(&U256::MAX) + BigUint::from(1u8);
        assert!(big_uint_to_u256(&too_large).is_err());
    }

    #[test]
    fn fractional_big_decimal_is_rejected() {
        let fractional = BigDecimal::from_str("1.5").unwrap();
        assert!(big_decimal_to_u256(&fractional).is_err());
    }

    #[test]
    fn integral_big_decimal_converts() {
        let value = BigDecimal::from_str("123456789").unwrap();
        assert_eq!(
            big_decimal_to_u256(&value).unwrap(),
            U256::from(123456789u64)
        );
    }
}
