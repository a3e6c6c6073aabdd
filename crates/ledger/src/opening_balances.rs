//! Opening balances assigned to a pair before any movement existed.
//!
//! Rows are kept as history: assigning a new opening balance deactivates the
//! previous one instead of deleting it.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, BalanceKey, LedgerError, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningBalance {
    pub id: Uuid,
    pub key: BalanceKey,
    pub amount: Amount,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: String,
    pub active: bool,
}

impl OpeningBalance {
    pub(crate) fn new(key: BalanceKey, amount: Amount, assigned_by: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            amount,
            assigned_at: Utc::now(),
            assigned_by,
            active: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "opening_balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub location_id: String,
    pub currency_id: String,
    pub amount: i64,
    pub assigned_at: DateTimeUtc,
    pub assigned_by: String,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&OpeningBalance> for ActiveModel {
    fn from(value: &OpeningBalance) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            location_id: ActiveValue::Set(value.key.location_id.clone()),
            currency_id: ActiveValue::Set(value.key.currency_id.clone()),
            amount: ActiveValue::Set(value.amount.minor()),
            assigned_at: ActiveValue::Set(value.assigned_at),
            assigned_by: ActiveValue::Set(value.assigned_by.clone()),
            active: ActiveValue::Set(value.active),
        }
    }
}

impl TryFrom<Model> for OpeningBalance {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "opening balance")?,
            key: BalanceKey::new(model.location_id, model.currency_id),
            amount: Amount::new(model.amount),
            assigned_at: model.assigned_at,
            assigned_by: model.assigned_by,
            active: model.active,
        })
    }
}
