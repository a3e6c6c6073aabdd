//! The movement log.
//!
//! A [`MovementEntry`] is a single signed change to the balance of one
//! (location, currency) pair. Rows are append-only: the ledger inserts them
//! through the recorder and never updates or deletes them.
//!
//! Amounts are stored as signed integer **minor units**:
//! - positive values increase the balance
//! - negative values decrease the balance

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, Channel, LedgerError, MovementKind, ReferenceKind, util::parse_uuid};

/// Pointer to the business operation that caused a movement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub id: String,
}

impl Reference {
    pub fn new(kind: ReferenceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Balance before and after a movement, captured when it was written.
///
/// Diagnostic only. Concurrent writers or manual edits can make these drift
/// from the real history, so balances are always recomputed from signed
/// amounts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub before: Amount,
    pub after: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEntry {
    pub id: Uuid,
    pub location_id: String,
    pub currency_id: String,
    pub kind: MovementKind,
    pub signed_amount: Amount,
    pub reference: Reference,
    pub channel: Channel,
    pub description: Option<String>,
    pub actor_id: String,
    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    snapshot: BalanceSnapshot,
}

impl MovementEntry {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        location_id: String,
        currency_id: String,
        kind: MovementKind,
        signed_amount: Amount,
        reference: Reference,
        channel: Channel,
        description: Option<String>,
        actor_id: String,
        occurred_at: DateTime<Utc>,
        snapshot: BalanceSnapshot,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            location_id,
            currency_id,
            kind,
            signed_amount,
            reference,
            channel,
            description,
            actor_id,
            occurred_at,
            recorded_at: Utc::now(),
            snapshot,
        }
    }

    /// Before/after balances stored with the entry, for audit views.
    #[must_use]
    pub fn snapshot(&self) -> BalanceSnapshot {
        self.snapshot
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub location_id: String,
    pub currency_id: String,
    pub kind: String,
    pub signed_amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub reference_kind: String,
    pub reference_id: String,
    pub channel: String,
    pub description: Option<String>,
    pub actor_id: String,
    pub occurred_at: DateTimeUtc,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&MovementEntry> for ActiveModel {
    fn from(entry: &MovementEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            location_id: ActiveValue::Set(entry.location_id.clone()),
            currency_id: ActiveValue::Set(entry.currency_id.clone()),
            kind: ActiveValue::Set(entry.kind.as_str().to_string()),
            signed_amount: ActiveValue::Set(entry.signed_amount.minor()),
            balance_before: ActiveValue::Set(entry.snapshot.before.minor()),
            balance_after: ActiveValue::Set(entry.snapshot.after.minor()),
            reference_kind: ActiveValue::Set(entry.reference.kind.as_str().to_string()),
            reference_id: ActiveValue::Set(entry.reference.id.clone()),
            channel: ActiveValue::Set(entry.channel.as_str().to_string()),
            description: ActiveValue::Set(entry.description.clone()),
            actor_id: ActiveValue::Set(entry.actor_id.clone()),
            occurred_at: ActiveValue::Set(entry.occurred_at),
            recorded_at: ActiveValue::Set(entry.recorded_at),
        }
    }
}

impl TryFrom<Model> for MovementEntry {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "movement")?,
            kind: MovementKind::try_from(model.kind.as_str())?,
            signed_amount: Amount::new(model.signed_amount),
            reference: Reference {
                kind: ReferenceKind::from(model.reference_kind.as_str()),
                id: model.reference_id,
            },
            channel: Channel::try_from(model.channel.as_str())?,
            description: model.description,
            actor_id: model.actor_id,
            occurred_at: model.occurred_at,
            recorded_at: model.recorded_at,
            snapshot: BalanceSnapshot {
                before: Amount::new(model.balance_before),
                after: Amount::new(model.balance_after),
            },
            location_id: model.location_id,
            currency_id: model.currency_id,
        })
    }
}
