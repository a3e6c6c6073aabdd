//! Movement kinds and the write-boundary rules attached to them.
//!
//! The sign of a stored movement is decided here and nowhere else:
//! [`normalize`] turns a caller-supplied magnitude into the canonical signed
//! amount and [`ensure_consistent`] rejects before/after snapshots that do not
//! match it. Because of this, replaying the log is a plain sum.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Amount, LedgerError, ResultLedger};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Income,
    Expense,
    Adjustment,
    OpeningBalance,
}

impl MovementKind {
    pub const ALL: [MovementKind; 4] = [
        Self::Income,
        Self::Expense,
        Self::Adjustment,
        Self::OpeningBalance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Adjustment => "adjustment",
            Self::OpeningBalance => "opening_balance",
        }
    }

    /// Storage labels of every kind the projector replays.
    pub(crate) fn canonical_labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|kind| kind.as_str()).collect()
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MovementKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "adjustment" => Ok(Self::Adjustment),
            "opening_balance" => Ok(Self::OpeningBalance),
            other => Err(LedgerError::InvalidMovementKind(other.to_string())),
        }
    }
}

impl FromStr for MovementKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

/// Which business operation produced a movement.
///
/// Traceability only; never used to recompute balances.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Transfer,
    ExternalPosting,
    Closing,
    ManualAdjustment,
    Opening,
    Other(String),
}

impl ReferenceKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Transfer => "transfer",
            Self::ExternalPosting => "external_posting",
            Self::Closing => "closing",
            Self::ManualAdjustment => "manual_adjustment",
            Self::Opening => "opening",
            Self::Other(label) => label.as_str(),
        }
    }
}

impl From<&str> for ReferenceKind {
    fn from(value: &str) -> Self {
        match value {
            "transfer" => Self::Transfer,
            "external_posting" => Self::ExternalPosting,
            "closing" => Self::Closing,
            "manual_adjustment" => Self::ManualAdjustment,
            "opening" => Self::Opening,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-split of a cached balance touched by a movement.
///
/// Only the total `quantity` is reconciled against the log; the
/// cash/bank split is bookkeeping maintained alongside it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    Cash,
    Bank,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Bank => "bank",
        }
    }
}

impl TryFrom<&str> for Channel {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "bank" => Ok(Self::Bank),
            other => Err(LedgerError::InvalidAmount(format!(
                "invalid channel: {other}"
            ))),
        }
    }
}

impl FromStr for Channel {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

/// Produces the canonical signed amount to persist for `kind`.
///
/// Callers pass a magnitude; the sign of `raw` is ignored except for
/// [`MovementKind::Adjustment`], whose sign is the correction direction.
pub fn normalize(kind: MovementKind, raw: Amount) -> ResultLedger<Amount> {
    if raw.is_zero() && kind != MovementKind::Adjustment {
        return Err(LedgerError::ZeroAmountNotAllowed(kind));
    }
    Ok(match kind {
        MovementKind::Income | MovementKind::OpeningBalance => raw.abs(),
        MovementKind::Expense => -raw.abs(),
        MovementKind::Adjustment => raw,
    })
}

/// Checks that `balance_after - balance_before` is the delta `kind` implies
/// for `signed_amount`, within [`TOLERANCE`](crate::TOLERANCE).
pub fn ensure_consistent(
    kind: MovementKind,
    signed_amount: Amount,
    balance_before: Amount,
    balance_after: Amount,
) -> ResultLedger<()> {
    let expected = match kind {
        MovementKind::Income | MovementKind::OpeningBalance => signed_amount.abs(),
        MovementKind::Expense => -signed_amount.abs(),
        MovementKind::Adjustment => signed_amount,
    };
    let actual = balance_after
        .checked_sub(balance_before)
        .ok_or_else(|| LedgerError::InvalidAmount("balance delta overflow".to_string()))?;
    if !actual.within_tolerance(expected) {
        return Err(LedgerError::MovementInconsistency {
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_applies_canonical_sign() {
        let fifty = Amount::new(5_000);
        assert_eq!(normalize(MovementKind::Income, fifty).unwrap(), fifty);
        assert_eq!(normalize(MovementKind::Income, -fifty).unwrap(), fifty);
        assert_eq!(normalize(MovementKind::OpeningBalance, fifty).unwrap(), fifty);
        assert_eq!(normalize(MovementKind::Expense, fifty).unwrap(), -fifty);
        assert_eq!(normalize(MovementKind::Expense, -fifty).unwrap(), -fifty);
        assert_eq!(
            normalize(MovementKind::Adjustment, Amount::new(-1_250)).unwrap(),
            Amount::new(-1_250)
        );
    }

    #[test]
    fn normalize_rejects_zero_except_adjustment() {
        assert_eq!(
            normalize(MovementKind::Expense, Amount::ZERO),
            Err(LedgerError::ZeroAmountNotAllowed(MovementKind::Expense))
        );
        assert_eq!(
            normalize(MovementKind::Income, Amount::ZERO),
            Err(LedgerError::ZeroAmountNotAllowed(MovementKind::Income))
        );
        assert_eq!(
            normalize(MovementKind::Adjustment, Amount::ZERO).unwrap(),
            Amount::ZERO
        );
    }

    #[test]
    fn kind_labels_round_trip() {
        for kind in MovementKind::ALL {
            assert_eq!(MovementKind::try_from(kind.as_str()).unwrap(), kind);
        }
        assert_eq!(
            "transfer_in".parse::<MovementKind>(),
            Err(LedgerError::InvalidMovementKind("transfer_in".to_string()))
        );
    }

    #[test]
    fn consistency_accepts_rounding_slack() {
        let before = Amount::new(10_000);
        ensure_consistent(MovementKind::Income, Amount::new(5_000), before, Amount::new(15_001))
            .unwrap();
        ensure_consistent(MovementKind::Expense, Amount::new(-3_000), before, Amount::new(7_000))
            .unwrap();
    }

    #[test]
    fn consistency_rejects_wrong_direction() {
        let err = ensure_consistent(
            MovementKind::Expense,
            Amount::new(3_000),
            Amount::new(10_000),
            Amount::new(13_000),
        )
        .unwrap_err();
        assert_eq!(
            err,
            LedgerError::MovementInconsistency {
                kind: MovementKind::Expense,
                expected: Amount::new(-3_000),
                actual: Amount::new(3_000),
            }
        );
    }

    #[test]
    fn consistency_rejects_off_by_two_minor_units() {
        assert!(
            ensure_consistent(
                MovementKind::Adjustment,
                Amount::new(-500),
                Amount::new(1_000),
                Amount::new(502),
            )
            .is_err()
        );
    }

    #[test]
    fn reference_kind_keeps_unknown_labels() {
        assert_eq!(ReferenceKind::from("transfer"), ReferenceKind::Transfer);
        assert_eq!(
            ReferenceKind::from("courier"),
            ReferenceKind::Other("courier".to_string())
        );
    }
}
