use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{LedgerError, ResultLedger};

/// Largest difference between two balances that still counts as "equal"
/// (0.01 currency units).
pub const TOLERANCE: Amount = Amount(1);

/// Signed amount of money represented as **integer minor units**
/// (hundredths of a currency unit).
///
/// Every balance, movement and snapshot in the ledger uses this type, so
/// the two-decimal rounding of a projection is exact by construction.
///
/// The value is signed:
/// - positive = money coming in
/// - negative = money going out
///
/// # Examples
///
/// ```rust
/// use ledger::Amount;
///
/// let amount = Amount::new(12_034);
/// assert_eq!(amount.minor(), 12034);
/// assert_eq!(amount.to_string(), "120.34");
/// ```
///
/// Parsing from operator input (accepts `.` or `,` as decimal separator;
/// rejects more than 2 decimals):
///
/// ```rust
/// use ledger::Amount;
///
/// assert_eq!("10".parse::<Amount>().unwrap().minor(), 1000);
/// assert_eq!("10,5".parse::<Amount>().unwrap().minor(), 1050);
/// assert!("12.345".parse::<Amount>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Creates a new amount from minor units.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Magnitude of the amount.
    #[must_use]
    pub const fn abs(self) -> Amount {
        Amount(self.0.saturating_abs())
    }

    /// Returns `true` if `self` and `other` differ by at most [`TOLERANCE`].
    #[must_use]
    pub fn within_tolerance(self, other: Amount) -> bool {
        (i128::from(self.0) - i128::from(other.0)).abs() <= i128::from(TOLERANCE.0)
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// [`Amount::checked_add`] with the overflow reported as
    /// [`LedgerError::InvalidAmount`] naming `context`.
    pub(crate) fn try_add(self, rhs: Amount, context: &str) -> ResultLedger<Amount> {
        self.checked_add(rhs)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("overflow in {context}")))
    }

    pub(crate) fn try_sub(self, rhs: Amount, context: &str) -> ResultLedger<Amount> {
        self.checked_sub(rhs)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("overflow in {context}")))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / 100;
        let minor = abs % 100;
        write!(f, "{sign}{units}.{minor:02}")
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Amount> for i64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        Amount(-self.0)
    }
}

impl FromStr for Amount {
    type Err = LedgerError;

    /// Parses a decimal string into minor units.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    /// At most 2 fractional digits are allowed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let empty = || LedgerError::InvalidAmount("empty amount".to_string());
        let invalid = || LedgerError::InvalidAmount(format!("invalid amount: {s}"));
        let overflow = || LedgerError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let rest = rest.trim().replace(',', ".");
        if rest.is_empty() {
            return Err(empty());
        }

        let mut parts = rest.split('.');
        let units_str = parts.next().ok_or_else(invalid)?;
        let minor_str = parts.next();
        if parts.next().is_some() {
            return Err(invalid());
        }

        if units_str.is_empty() || !units_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let units: i64 = units_str.parse().map_err(|_| overflow())?;

        let minor: i64 = match minor_str {
            None | Some("") => 0,
            Some(frac) => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                match frac.len() {
                    1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
                    2 => frac.parse::<i64>().map_err(|_| invalid())?,
                    _ => {
                        return Err(LedgerError::InvalidAmount(
                            "too many decimals".to_string(),
                        ));
                    }
                }
            }
        };

        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(minor))
            .ok_or_else(overflow)?;

        Ok(Amount(if negative { -total } else { total }))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_two_decimals() {
        assert_eq!(Amount::new(0).to_string(), "0.00");
        assert_eq!(Amount::new(1).to_string(), "0.01");
        assert_eq!(Amount::new(10).to_string(), "0.10");
        assert_eq!(Amount::new(12_000).to_string(), "120.00");
        assert_eq!(Amount::new(-38_000).to_string(), "-380.00");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<Amount>().unwrap().minor(), 1000);
        assert_eq!("10.5".parse::<Amount>().unwrap().minor(), 1050);
        assert_eq!("10,50".parse::<Amount>().unwrap().minor(), 1050);
        assert_eq!("-12.5".parse::<Amount>().unwrap().minor(), -1250);
        assert_eq!("+1.00".parse::<Amount>().unwrap().minor(), 100);
        assert_eq!("  2.30 ".parse::<Amount>().unwrap().minor(), 230);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("12.345".parse::<Amount>().is_err());
        assert!("".parse::<Amount>().is_err());
        assert!("-".parse::<Amount>().is_err());
        assert!("1.2.3".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn tolerance_is_one_minor_unit() {
        let projected = Amount::new(25_000);
        assert!(Amount::new(25_001).within_tolerance(projected));
        assert!(Amount::new(24_999).within_tolerance(projected));
        assert!(!Amount::new(25_002).within_tolerance(projected));
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&Amount::new(-1250)).unwrap();
        assert_eq!(json, "\"-12.50\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Amount::new(-1250));
    }
}
