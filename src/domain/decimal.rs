//! Exact decimal quantities for fill and trade arithmetic.

use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

/// A price, size, fee or PnL value. Serialized as a decimal string.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Decimal(RustDecimal);

impl Decimal {
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// Parse an exchange or stored decimal string without loss.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Shortest plain form: trailing zeros dropped, never an exponent.
    pub fn to_canonical_string(&self) -> String {
        self.0.normalize().to_string()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_positive()
    }

    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// Round to `dp` fractional digits, halves away from zero.
    pub fn round_dp(&self, dp: u32) -> Self {
        Decimal(
            self.0
                .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// `self / rhs`, or zero when `rhs` is zero.
    pub fn div_or_zero(&self, rhs: Decimal) -> Self {
        self.0
            .checked_div(rhs.0)
            .map(Decimal)
            .unwrap_or_else(Decimal::zero)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_canonical_string_drops_trailing_zeros() {
        assert_eq!(d("50000.500").to_canonical_string(), "50000.5");
        assert_eq!(d("0.00010").to_canonical_string(), "0.0001");
        assert_eq!(d("-2.0").to_canonical_string(), "-2");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Decimal::from_str_canonical("").is_err());
        assert!(Decimal::from_str_canonical("1.2.3").is_err());
        assert!(Decimal::from_str_canonical("abc").is_err());
    }

    #[test]
    fn test_exact_accumulation() {
        let mut size = Decimal::zero();
        for _ in 0..10 {
            size += d("0.1");
        }
        size -= d("1");
        assert!(size.is_zero());
        assert!(!size.is_positive());
        assert_eq!((d("10.5") * d("2.5") - d("0.25")).to_string(), "26");
    }

    #[test]
    fn test_round_dp_halves_away_from_zero() {
        assert_eq!(d("116.123456785").round_dp(8).to_string(), "116.12345679");
        assert_eq!(d("-0.0000005").round_dp(6).to_string(), "-0.000001");
        assert_eq!(d("0.0000004").round_dp(6).to_string(), "0");
    }

    #[test]
    fn test_div_or_zero() {
        assert_eq!(d("1160").div_or_zero(d("10")).to_string(), "116");
        assert!(d("5").div_or_zero(Decimal::zero()).is_zero());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_value(d("123.4500")).unwrap();
        assert!(json.is_string());
        let back: Decimal = serde_json::from_value(json).unwrap();
        assert_eq!(back, d("123.45"));
    }
}
