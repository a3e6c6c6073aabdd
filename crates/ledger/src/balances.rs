//! The cached balance store.
//!
//! One mutable row per (location, currency) pair holds the fast-read
//! balance shown to operators. The movement log is the source of truth;
//! this row is a denormalized view of it that the recorder keeps in step
//! and reconciliation repairs.

use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{Amount, Channel, ResultLedger};

/// Identifies the balance of one currency at one location.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub location_id: String,
    pub currency_id: String,
}

impl BalanceKey {
    pub fn new(location_id: impl Into<String>, currency_id: impl Into<String>) -> Self {
        Self {
            location_id: location_id.into(),
            currency_id: currency_id.into(),
        }
    }

    pub(crate) fn primary_key(&self) -> (String, String) {
        (self.location_id.clone(), self.currency_id.clone())
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location_id, self.currency_id)
    }
}

/// Snapshot of a cached balance row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedBalance {
    pub key: BalanceKey,
    /// Reconciled total.
    pub quantity: Amount,
    /// Physical cash part of `quantity`. Not reconciled.
    pub cash_quantity: Amount,
    /// Bank-held part of `quantity`. Not reconciled.
    pub bank_quantity: Amount,
    pub version: i64,
    pub updated_at: Option<DateTime<Utc>>,
    pub reconciled_at: Option<DateTime<Utc>>,
    pub reconciled_by: Option<String>,
}

impl CachedBalance {
    /// View of a pair that has no row yet.
    pub fn empty(key: BalanceKey) -> Self {
        Self {
            key,
            quantity: Amount::ZERO,
            cash_quantity: Amount::ZERO,
            bank_quantity: Amount::ZERO,
            version: 0,
            updated_at: None,
            reconciled_at: None,
            reconciled_by: None,
        }
    }

    /// Applies a movement delta to the total and to the channel's sub-split.
    ///
    /// Nothing changes if either sum overflows.
    pub(crate) fn apply(&mut self, channel: Channel, delta: Amount) -> ResultLedger<()> {
        let context = format!("cached balance {}", self.key);
        let quantity = self.quantity.try_add(delta, &context)?;
        let split = match channel {
            Channel::Cash => &mut self.cash_quantity,
            Channel::Bank => &mut self.bank_quantity,
        };
        *split = split.try_add(delta, &context)?;
        self.quantity = quantity;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cached_balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub location_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub currency_id: String,
    pub quantity: i64,
    pub cash_quantity: i64,
    pub bank_quantity: i64,
    pub version: i64,
    pub updated_at: DateTimeUtc,
    pub reconciled_at: Option<DateTimeUtc>,
    pub reconciled_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for CachedBalance {
    fn from(model: Model) -> Self {
        Self {
            key: BalanceKey::new(model.location_id, model.currency_id),
            quantity: Amount::new(model.quantity),
            cash_quantity: Amount::new(model.cash_quantity),
            bank_quantity: Amount::new(model.bank_quantity),
            version: model.version,
            updated_at: Some(model.updated_at),
            reconciled_at: model.reconciled_at,
            reconciled_by: model.reconciled_by,
        }
    }
}

impl From<&CachedBalance> for ActiveModel {
    /// Full row for a first insert (version 1).
    fn from(balance: &CachedBalance) -> Self {
        Self {
            location_id: ActiveValue::Set(balance.key.location_id.clone()),
            currency_id: ActiveValue::Set(balance.key.currency_id.clone()),
            quantity: ActiveValue::Set(balance.quantity.minor()),
            cash_quantity: ActiveValue::Set(balance.cash_quantity.minor()),
            bank_quantity: ActiveValue::Set(balance.bank_quantity.minor()),
            version: ActiveValue::Set(1),
            updated_at: ActiveValue::Set(Utc::now()),
            reconciled_at: ActiveValue::Set(balance.reconciled_at),
            reconciled_by: ActiveValue::Set(balance.reconciled_by.clone()),
        }
    }
}
