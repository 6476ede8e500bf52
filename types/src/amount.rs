//! Fixed-point helpers.
//!
//! Token amounts are 18-decimal fixed-point integers (u128). Products of two
//! such values overflow u128 quickly, so every `a * b / c` goes through a
//! 256-bit intermediate.

use primitive_types::U256;

/// One whole token (and one whole relative weight) in fixed-point.
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Basis-point denominator for vote allocations.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// `a * b / denominator`, rounded down. `None` on division by zero or if the
/// result does not fit in u128.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Option<u128> {
    let wide = mul_div_u256(U256::from(a), U256::from(b), U256::from(denominator))?;
    u256_to_u128(wide)
}

/// 256-bit `a * b / denominator`, rounded down.
pub fn mul_div_u256(a: U256, b: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    a.checked_mul(b).map(|p| p / denominator)
}

pub fn u256_to_u128(value: U256) -> Option<u128> {
    if value > U256::from(u128::MAX) {
        None
    } else {
        Some(value.low_u128())
    }
}

/// Serde adapter for u128 amounts in human-readable formats.
///
/// TOML and JSON integers stop at 64 bits, so amounts are written as decimal
/// strings there and read back from either a string or a plain integer.
/// Binary formats keep the native u128.
pub mod decimal {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(value)
        } else {
            serializer.serialize_u128(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(DecimalVisitor)
        } else {
            deserializer.deserialize_u128(DecimalVisitor)
        }
    }

    struct DecimalVisitor;

    impl Visitor<'_> for DecimalVisitor {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
            Ok(u128::from(v))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
            u128::try_from(v).map_err(|_| E::custom("amount must not be negative"))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
            v.replace('_', "").parse().map_err(E::custom)
        }
    }
}
