use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, PaginatorTrait, QueryFilter, QuerySelect,
    TransactionTrait, prelude::*,
};

use crate::{
    Amount, BalanceKey, CloseDayCmd, ClosingLine, DayClosing, LedgerError, MovementKind,
    RecordCmd, Reference, ReferenceKind, ResultLedger, balances, closings,
    closings::business_day_label, util::require_id,
};

use super::{
    Ledger,
    projector::{Cutoff, flows_between, project_with},
    with_tx,
};

/// Validated closing request, shared by every attempt.
struct DayToClose {
    location_id: String,
    actor_id: String,
    day: NaiveDate,
    label: String,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
    adjustment_at: DateTime<Utc>,
    counted: BTreeMap<String, Amount>,
}

impl Ledger {
    /// Closes a business day at a location.
    ///
    /// For every currency held at the location (or counted by the operator)
    /// the closing freezes the balance the day opened with, the day's inflows
    /// and outflows and the expected end balance, all replayed from the log.
    /// A counted amount that differs from the expected one is booked as an
    /// adjustment inside the day. A location closes each day once; a location
    /// with nothing to close is rejected with [`LedgerError::KeyNotFound`].
    pub async fn close_day(&self, cmd: CloseDayCmd) -> ResultLedger<DayClosing> {
        let location_id = require_id(&cmd.location_id, "location_id")?;
        let actor_id = require_id(&cmd.actor_id, "actor_id")?;
        let day = cmd.business_day;
        if day > self.clock.today() {
            return Err(LedgerError::InvalidAmount(format!(
                "cannot close future business day {day}"
            )));
        }
        let (day_start, day_end) = self.clock.day_bounds(day)?;

        let mut counted: BTreeMap<String, Amount> = BTreeMap::new();
        for (currency_id, amount) in cmd.counted {
            let currency_id = require_id(&currency_id, "currency_id")?;
            if amount.is_negative() {
                return Err(LedgerError::InvalidAmount(format!(
                    "counted {currency_id} must be >= 0"
                )));
            }
            if counted.insert(currency_id.clone(), amount).is_some() {
                return Err(LedgerError::InvalidAmount(format!(
                    "{currency_id} counted twice"
                )));
            }
        }

        let request = DayToClose {
            adjustment_at: self.clock.stamp_within(day)?,
            label: business_day_label(day),
            location_id,
            actor_id,
            day,
            day_start,
            day_end,
            counted,
        };

        let mut keys = closing_keys(&self.database, &request).await?;
        let closing = loop {
            if keys.is_empty() {
                return Err(LedgerError::KeyNotFound(format!(
                    "balances at {}",
                    request.location_id
                )));
            }
            let _guard = self.locks.acquire(&keys).await;
            let attempt = with_tx!(self, |db_tx| {
                // A pair first written after the keys were read is not
                // covered by the guard.
                let current = closing_keys(&db_tx, &request).await?;
                if current == keys {
                    self.close_pairs(&db_tx, &request, &keys).await.map(Ok)
                } else {
                    Ok(Err(current))
                }
            })?;
            match attempt {
                Ok(closing) => break closing,
                Err(current) => {
                    tracing::debug!(
                        location_id = %request.location_id,
                        "currency set changed before closing, retrying"
                    );
                    keys = current;
                }
            }
        };

        tracing::info!(
            location_id = %closing.location_id,
            business_day = %request.label,
            currencies = closing.lines.len(),
            adjustments = closing.lines.iter().filter(|l| l.adjustment.is_some()).count(),
            "business day closed"
        );
        self.reconcile_after_commit(&keys, &request.actor_id).await;
        Ok(closing)
    }

    async fn close_pairs(
        &self,
        db_tx: &DatabaseTransaction,
        request: &DayToClose,
        keys: &[BalanceKey],
    ) -> ResultLedger<DayClosing> {
        let location_id = &request.location_id;
        let label = &request.label;
        let already_closed = closings::Entity::find()
            .filter(closings::Column::LocationId.eq(location_id.as_str()))
            .filter(closings::Column::BusinessDay.eq(label.as_str()))
            .count(db_tx)
            .await?;
        if already_closed > 0 {
            return Err(LedgerError::ExistingKey(format!(
                "closing {location_id} {label}"
            )));
        }

        let mut closing = DayClosing {
            location_id: location_id.clone(),
            business_day: request.day,
            closed_by: request.actor_id.clone(),
            closed_at: Utc::now(),
            lines: Vec::with_capacity(keys.len()),
        };

        for key in keys {
            let context = format!("closing of {key}");
            let opening =
                project_with(db_tx, key, Some(Cutoff::Exclusive(request.day_start))).await?;
            let (inflows, outflows) =
                flows_between(db_tx, key, request.day_start, request.day_end).await?;
            let expected = opening
                .try_add(inflows, &context)?
                .try_add(outflows, &context)?;
            let counted_amount = request.counted.get(&key.currency_id).copied();

            let adjustment = match counted_amount {
                Some(count) if count != expected => {
                    let cmd = RecordCmd::new(
                        key.location_id.clone(),
                        key.currency_id.clone(),
                        MovementKind::Adjustment,
                        count.try_sub(expected, &context)?,
                        request.actor_id.clone(),
                        Reference::new(ReferenceKind::Closing, format!("{location_id}:{label}")),
                        request.adjustment_at,
                    )
                    .description(format!("count difference at closing {label}"));
                    Some(self.record_in(db_tx, &cmd).await?)
                }
                _ => None,
            };

            let line = ClosingLine {
                currency_id: key.currency_id.clone(),
                opening,
                inflows,
                outflows,
                expected,
                counted: counted_amount,
                closing: counted_amount.unwrap_or(expected),
                adjustment,
            };
            closings::ActiveModel::from_line(&closing, &line)
                .insert(db_tx)
                .await?;
            closing.lines.push(line);
        }
        Ok(closing)
    }
}

/// Pairs a closing covers: every cached currency at the location plus the
/// counted ones, in lock order.
async fn closing_keys<C: ConnectionTrait>(
    db: &C,
    request: &DayToClose,
) -> ResultLedger<Vec<BalanceKey>> {
    let held: Vec<String> = balances::Entity::find()
        .filter(balances::Column::LocationId.eq(request.location_id.as_str()))
        .select_only()
        .column(balances::Column::CurrencyId)
        .into_tuple()
        .all(db)
        .await?;
    let currencies: BTreeSet<String> = held
        .into_iter()
        .chain(request.counted.keys().cloned())
        .collect();
    Ok(currencies
        .into_iter()
        .map(|currency_id| BalanceKey::new(request.location_id.as_str(), currency_id))
        .collect())
}
