// Copyright (c) 2025 - Cowboy AI, Inc.
//! Integer minor-unit money (§4.10).
//!
//! Balances and prices are stored as `i64` minor units (cents) inside
//! aggregates to avoid binary-float drift. Conversion to/from a decimal
//! major-unit representation only happens at the API boundary and rounds
//! half-to-even.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

use crate::errors::LibraryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor_units(minor: i64) -> Self {
        Money(minor)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// Parse a decimal major-unit string (e.g. `"29.99"`) into minor units,
    /// rounding any extra fractional precision half-to-even.
    pub fn from_major_str(s: &str) -> Result<Self, LibraryError> {
        let value: f64 = s.trim().parse().map_err(|_| LibraryError::ValidationError(format!("invalid money value: {s}")))?;
        Ok(Money(round_half_to_even_cents(value)))
    }

    pub fn to_major_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_major_decimal_string())
    }
}

/// Round a major-unit decimal value to minor-unit cents using banker's
/// rounding (round-half-to-even), per §4.10.
pub fn round_half_to_even_cents(major: f64) -> i64 {
    let cents = major * 100.0;
    let floor = cents.floor();
    let diff = cents - floor;
    let rounded = if (diff - 0.5).abs() < 1e-9 {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        cents.round()
    };
    rounded as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_major_string_to_minor_units() {
        assert_eq!(Money::from_major_str("29.99").unwrap().minor_units(), 2999);
        assert_eq!(Money::from_major_str("3.00").unwrap().minor_units(), 300);
    }

    #[test]
    fn rounds_half_to_even_at_the_cent_boundary() {
        assert_eq!(round_half_to_even_cents(0.125), 12);
        assert_eq!(round_half_to_even_cents(0.135), 14);
    }

    #[test]
    fn display_formats_two_decimals() {
        let m = Money::from_minor_units(300);
        assert_eq!(m.to_string(), "3.00");
        assert_eq!(Money::from_minor_units(-150).to_string(), "-1.50");
    }

    #[test]
    fn arithmetic_is_exact_integer() {
        let a = Money::from_minor_units(1500);
        let b = Money::from_minor_units(1200);
        assert_eq!((a - b).minor_units(), 300);
        assert_eq!(a.checked_sub(Money::from_minor_units(2000)).unwrap().minor_units(), -500);
    }

    #[test]
    fn late_fee_formula_matches_scenario_s3() {
        let fee_per_day = Money::from_minor_units(20);
        let days_late = 60i64;
        let fee = Money::from_minor_units(fee_per_day.minor_units() * days_late);
        assert_eq!(fee.minor_units(), 1200);
        let retail_price = Money::from_major_str("10.00").unwrap();
        assert!(fee.minor_units() >= retail_price.minor_units());
    }
}
