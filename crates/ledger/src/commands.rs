//! Command structs for ledger write operations.
//!
//! These types group parameters for the recorder and the business
//! orchestrators, keeping call sites readable and avoiding long argument
//! lists.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Amount, BalanceKey, Channel, MovementKind, Reference, ReferenceKind};

/// Record a single movement.
#[derive(Clone, Debug)]
pub struct RecordCmd {
    pub location_id: String,
    pub currency_id: String,
    pub kind: MovementKind,
    /// Magnitude for income/expense/opening; signed correction for adjustments.
    pub amount: Amount,
    pub actor_id: String,
    pub reference: Reference,
    pub description: Option<String>,
    pub channel: Channel,
    pub occurred_at: DateTime<Utc>,
}

impl RecordCmd {
    #[must_use]
    pub fn new(
        location_id: impl Into<String>,
        currency_id: impl Into<String>,
        kind: MovementKind,
        amount: Amount,
        actor_id: impl Into<String>,
        reference: Reference,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            location_id: location_id.into(),
            currency_id: currency_id.into(),
            kind,
            amount,
            actor_id: actor_id.into(),
            reference,
            description: None,
            channel: Channel::default(),
            occurred_at,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.location_id.trim(), self.currency_id.trim())
    }
}

/// Assign the opening balance of a pair.
#[derive(Clone, Debug)]
pub struct OpeningBalanceCmd {
    pub location_id: String,
    pub currency_id: String,
    pub amount: Amount,
    pub actor_id: String,
}

impl OpeningBalanceCmd {
    #[must_use]
    pub fn new(
        location_id: impl Into<String>,
        currency_id: impl Into<String>,
        amount: Amount,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            location_id: location_id.into(),
            currency_id: currency_id.into(),
            amount,
            actor_id: actor_id.into(),
        }
    }
}

/// Settle a transfer of one currency between two locations.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub transfer_id: String,
    pub from_location_id: String,
    pub to_location_id: String,
    pub currency_id: String,
    pub amount: Amount,
    pub actor_id: String,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        transfer_id: impl Into<String>,
        from_location_id: impl Into<String>,
        to_location_id: impl Into<String>,
        currency_id: impl Into<String>,
        amount: Amount,
        actor_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            transfer_id: transfer_id.into(),
            from_location_id: from_location_id.into(),
            to_location_id: to_location_id.into(),
            currency_id: currency_id.into(),
            amount,
            actor_id: actor_id.into(),
            note: None,
            occurred_at,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub(crate) fn debit(&self, note: Option<String>) -> RecordCmd {
        let mut cmd = RecordCmd::new(
            self.from_location_id.clone(),
            self.currency_id.clone(),
            MovementKind::Expense,
            self.amount,
            self.actor_id.clone(),
            Reference::new(ReferenceKind::Transfer, self.transfer_id.clone()),
            self.occurred_at,
        );
        cmd.description = note;
        cmd
    }

    pub(crate) fn credit(&self, note: Option<String>) -> RecordCmd {
        let mut cmd = RecordCmd::new(
            self.to_location_id.clone(),
            self.currency_id.clone(),
            MovementKind::Income,
            self.amount,
            self.actor_id.clone(),
            Reference::new(ReferenceKind::Transfer, self.transfer_id.clone()),
            self.occurred_at,
        );
        cmd.description = note;
        cmd
    }
}

/// Direction of an external-service cashflow as seen from the location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The location receives money (e.g. a customer pays a bill at the counter).
    Inflow,
    /// The location pays money out (e.g. a remittance is paid to a customer).
    Outflow,
}

impl Direction {
    pub fn movement_kind(self) -> MovementKind {
        match self {
            Self::Inflow => MovementKind::Income,
            Self::Outflow => MovementKind::Expense,
        }
    }
}

/// Post a cashflow of an external service at a location.
#[derive(Clone, Debug)]
pub struct ExternalPostingCmd {
    pub posting_id: String,
    pub service: String,
    pub location_id: String,
    pub currency_id: String,
    pub direction: Direction,
    pub amount: Amount,
    pub channel: Channel,
    pub actor_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl ExternalPostingCmd {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        posting_id: impl Into<String>,
        service: impl Into<String>,
        location_id: impl Into<String>,
        currency_id: impl Into<String>,
        direction: Direction,
        amount: Amount,
        actor_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            posting_id: posting_id.into(),
            service: service.into(),
            location_id: location_id.into(),
            currency_id: currency_id.into(),
            direction,
            amount,
            channel: Channel::default(),
            actor_id: actor_id.into(),
            occurred_at,
        }
    }

    #[must_use]
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }
}

/// Close a business day at a location.
#[derive(Clone, Debug)]
pub struct CloseDayCmd {
    pub location_id: String,
    pub business_day: NaiveDate,
    /// Physically counted amounts per currency.
    pub counted: Vec<(String, Amount)>,
    pub actor_id: String,
}

impl CloseDayCmd {
    #[must_use]
    pub fn new(
        location_id: impl Into<String>,
        business_day: NaiveDate,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            location_id: location_id.into(),
            business_day,
            counted: Vec::new(),
            actor_id: actor_id.into(),
        }
    }

    #[must_use]
    pub fn counted(mut self, currency_id: impl Into<String>, amount: Amount) -> Self {
        self.counted.push((currency_id.into(), amount));
        self
    }
}
