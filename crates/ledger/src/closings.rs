//! Daily closing records.
//!
//! A closing freezes, per currency, what a location opened the business day
//! with, what moved during it, what the log expected at the end and what the
//! operator counted.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, MovementEntry};

/// One currency of a day closing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingLine {
    pub currency_id: String,
    pub opening: Amount,
    pub inflows: Amount,
    pub outflows: Amount,
    pub expected: Amount,
    pub counted: Option<Amount>,
    pub closing: Amount,
    /// Adjustment recorded for the counted difference, if any.
    pub adjustment: Option<MovementEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayClosing {
    pub location_id: String,
    pub business_day: NaiveDate,
    pub closed_by: String,
    pub closed_at: DateTime<Utc>,
    pub lines: Vec<ClosingLine>,
}

impl DayClosing {
    pub fn line(&self, currency_id: &str) -> Option<&ClosingLine> {
        self.lines.iter().find(|l| l.currency_id == currency_id)
    }
}

pub(crate) fn business_day_label(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "daily_closings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub location_id: String,
    pub currency_id: String,
    pub business_day: String,
    pub opening: i64,
    pub inflows: i64,
    pub outflows: i64,
    pub expected: i64,
    pub counted: Option<i64>,
    pub closing: i64,
    pub adjustment_movement_id: Option<String>,
    pub closed_by: String,
    pub closed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn from_line(closing: &DayClosing, line: &ClosingLine) -> Self {
        Self {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            location_id: ActiveValue::Set(closing.location_id.clone()),
            currency_id: ActiveValue::Set(line.currency_id.clone()),
            business_day: ActiveValue::Set(business_day_label(closing.business_day)),
            opening: ActiveValue::Set(line.opening.minor()),
            inflows: ActiveValue::Set(line.inflows.minor()),
            outflows: ActiveValue::Set(line.outflows.minor()),
            expected: ActiveValue::Set(line.expected.minor()),
            counted: ActiveValue::Set(line.counted.map(Amount::minor)),
            closing: ActiveValue::Set(line.closing.minor()),
            adjustment_movement_id: ActiveValue::Set(
                line.adjustment.as_ref().map(|entry| entry.id.to_string()),
            ),
            closed_by: ActiveValue::Set(closing.closed_by.clone()),
            closed_at: ActiveValue::Set(closing.closed_at),
        }
    }
}
