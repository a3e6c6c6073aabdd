//! The module contains the errors the ledger can return.
//!
//! The errors fall into a few families:
//!
//! - caller input: [`InvalidMovementKind`], [`ZeroAmountNotAllowed`],
//!   [`InvalidAmount`], [`InvalidTimezone`];
//! - integrity: [`MovementInconsistency`], raised before anything is written;
//! - business rules: [`InsufficientBalance`], [`ExistingKey`], [`KeyNotFound`];
//! - concurrency: [`ConcurrentModification`];
//! - storage: [`Database`].
//!
//! Drift between the cached balance and the movement log is *not* an error:
//! reconciliation reports and fixes it.
//!
//!  [`InvalidMovementKind`]: LedgerError::InvalidMovementKind
//!  [`ZeroAmountNotAllowed`]: LedgerError::ZeroAmountNotAllowed
//!  [`InvalidAmount`]: LedgerError::InvalidAmount
//!  [`InvalidTimezone`]: LedgerError::InvalidTimezone
//!  [`MovementInconsistency`]: LedgerError::MovementInconsistency
//!  [`InsufficientBalance`]: LedgerError::InsufficientBalance
//!  [`ExistingKey`]: LedgerError::ExistingKey
//!  [`KeyNotFound`]: LedgerError::KeyNotFound
//!  [`ConcurrentModification`]: LedgerError::ConcurrentModification
//!  [`Database`]: LedgerError::Database
use sea_orm::DbErr;
use thiserror::Error;

use crate::{Amount, MovementKind};

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid movement kind: {0}")]
    InvalidMovementKind(String),
    #[error("zero amount not allowed for {0} movements")]
    ZeroAmountNotAllowed(MovementKind),
    #[error("inconsistent {kind} movement: expected delta {expected}, got {actual}")]
    MovementInconsistency {
        kind: MovementKind,
        expected: Amount,
        actual: Amount,
    },
    #[error(
        "insufficient balance for {currency_id} at {location_id}: available {available}, requested {requested}"
    )]
    InsufficientBalance {
        location_id: String,
        currency_id: String,
        available: Amount,
        requested: Amount,
    },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl LedgerError {
    /// Message safe to show to an operator at the counter.
    ///
    /// Input and business-rule errors keep their specific text; integrity,
    /// concurrency and storage failures collapse into a generic message and
    /// belong in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidMovementKind(_)
            | Self::ZeroAmountNotAllowed(_)
            | Self::InsufficientBalance { .. }
            | Self::InvalidAmount(_)
            | Self::InvalidTimezone(_)
            | Self::KeyNotFound(_)
            | Self::ExistingKey(_) => self.to_string(),
            Self::ConcurrentModification(_) => {
                "the balance changed while the operation was running, retry".to_string()
            }
            Self::MovementInconsistency { .. } | Self::Database(_) => {
                "internal ledger error".to_string()
            }
        }
    }
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidMovementKind(a), Self::InvalidMovementKind(b)) => a == b,
            (Self::ZeroAmountNotAllowed(a), Self::ZeroAmountNotAllowed(b)) => a == b,
            (
                Self::MovementInconsistency {
                    kind: ka,
                    expected: ea,
                    actual: aa,
                },
                Self::MovementInconsistency {
                    kind: kb,
                    expected: eb,
                    actual: ab,
                },
            ) => ka == kb && ea == eb && aa == ab,
            (
                Self::InsufficientBalance {
                    location_id: la,
                    currency_id: ca,
                    available: aa,
                    requested: ra,
                },
                Self::InsufficientBalance {
                    location_id: lb,
                    currency_id: cb,
                    available: ab,
                    requested: rb,
                },
            ) => la == lb && ca == cb && aa == ab && ra == rb,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidTimezone(a), Self::InvalidTimezone(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::ConcurrentModification(a), Self::ConcurrentModification(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_message_hides_internal_failures() {
        let insufficient = LedgerError::InsufficientBalance {
            location_id: "centro".to_string(),
            currency_id: "USD".to_string(),
            available: Amount::new(1000),
            requested: Amount::new(2500),
        };
        assert_eq!(
            insufficient.public_message(),
            "insufficient balance for USD at centro: available 10.00, requested 25.00"
        );

        let inconsistency = LedgerError::MovementInconsistency {
            kind: MovementKind::Income,
            expected: Amount::new(100),
            actual: Amount::new(90),
        };
        assert_eq!(inconsistency.public_message(), "internal ledger error");

        let db = LedgerError::Database(DbErr::Custom("disk I/O error".to_string()));
        assert_eq!(db.public_message(), "internal ledger error");
    }
}
