// Copyright (c) 2025 - Cowboy AI, Inc.
//! §4.10 numeric semantics: major-unit decimal strings round half-to-even at
//! the cent boundary when parsed into [`Money`].

use cim_library_core::domain::money::Money;
use test_case::test_case;

#[test_case("29.99", 2999)]
#[test_case("0.005", 0)] // exactly between 0.00 and 0.01, even side wins
#[test_case("0.015", 2)] // exactly between 0.01 and 0.02, even side wins
#[test_case("10.00", 1000)]
#[test_case("0.00", 0)]
#[test_case("-3.00", -300)]
fn parses_to_expected_minor_units(input: &str, expected_minor_units: i64) {
    let money = Money::from_major_str(input).unwrap();
    assert_eq!(money.minor_units(), expected_minor_units);
}
