//! Balance ledger and reconciliation engine for multi-branch cash desks.
//!
//! Every change to the cash held for a (location, currency) pair is a
//! signed [`MovementEntry`] appended to an immutable log. A cached balance row
//! per pair serves fast reads; [`Ledger::project`] recomputes the balance from
//! the log and [`Ledger::reconcile`] repairs the cache when the two drift
//! apart, without ever writing to the log.
//!
//! All writes to the log go through the recorder ([`Ledger::record`]) or the
//! business orchestrators built on it (transfers, external-service postings,
//! daily closings).

pub use balances::{BalanceKey, CachedBalance};
pub use clock::BusinessClock;
pub use closings::{ClosingLine, DayClosing};
pub use commands::{
    CloseDayCmd, Direction, ExternalPostingCmd, OpeningBalanceCmd, RecordCmd, TransferCmd,
};
pub use error::LedgerError;
pub use kind::{Channel, MovementKind, ReferenceKind, ensure_consistent, normalize};
pub use money::{Amount, TOLERANCE};
pub use movements::{BalanceSnapshot, MovementEntry, Reference};
pub use opening_balances::OpeningBalance;
pub use ops::{
    Inconsistency, Ledger, LedgerBuilder, PairOutcome, Reconciliation, TransferReceipt,
};

mod balances;
mod clock;
mod closings;
mod commands;
mod error;
mod kind;
mod money;
mod movements;
mod opening_balances;
mod ops;
mod util;

pub type ResultLedger<T> = Result<T, LedgerError>;
