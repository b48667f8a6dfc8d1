//! Exact currency amounts as integer cents.
//!
//! Prices are never stored as floating point: a card bought at 285.50 must
//! round-trip through the database and the marketplace feed without drift.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A currency amount in whole cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Locale-invariant parse of a decimal price string ("285.50", "5,00", "12").
    ///
    /// A lone comma is accepted as decimal separator. More than two fractional
    /// digits, thousands separators, or any non-numeric input yield `None` -
    /// an unknown price must stay unknown, never default to zero.
    pub fn parse(input: &str) -> Option<Money> {
        let cleaned = input.trim().replace(',', ".");
        if cleaned.is_empty() {
            return None;
        }

        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.as_str()),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let whole: i64 = whole.parse().ok()?;
        let frac_cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().ok()? * 10,
            _ => frac.parse().ok()?,
        };

        let cents = whole.checked_mul(100)?.checked_add(frac_cents)?;
        Some(Money(if negative { -cents } else { cents }))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_decimal() {
        assert_eq!(Money::parse("285.50"), Some(Money::from_cents(28550)));
        assert_eq!(Money::parse("12"), Some(Money::from_cents(1200)));
        assert_eq!(Money::parse("0.05"), Some(Money::from_cents(5)));
        assert_eq!(Money::parse("3.5"), Some(Money::from_cents(350)));
    }

    #[test]
    fn parses_comma_as_decimal_separator() {
        assert_eq!(Money::parse("5,00"), Some(Money::from_cents(500)));
    }

    #[test]
    fn rejects_garbage_instead_of_defaulting_to_zero() {
        assert_eq!(Money::parse(""), None);
        assert_eq!(Money::parse("   "), None);
        assert_eq!(Money::parse("free"), None);
        assert_eq!(Money::parse("12.345"), None);
        assert_eq!(Money::parse("1,234.56"), None);
        assert_eq!(Money::parse("$5.00"), None);
    }

    #[test]
    fn parses_negative_amounts() {
        assert_eq!(Money::parse("-3.50"), Some(Money::from_cents(-350)));
        assert!(Money::from_cents(-1).is_negative());
    }

    #[test]
    fn displays_with_two_fraction_digits() {
        assert_eq!(Money::from_cents(28550).to_string(), "285.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-350).to_string(), "-3.50");
    }

    #[test]
    fn display_round_trips_through_parse() {
        let m = Money::from_cents(199);
        assert_eq!(Money::parse(&m.to_string()), Some(m));
    }
}
