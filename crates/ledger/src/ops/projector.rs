use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, prelude::*,
};

use crate::{
    Amount, BalanceKey, LedgerError, MovementEntry, MovementKind, ResultLedger, movements,
    opening_balances,
};

use super::Ledger;

/// Upper bound on `occurred_at` for a replay.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Cutoff {
    /// Entries at or before the instant.
    Inclusive(DateTime<Utc>),
    /// Entries strictly before the instant.
    Exclusive(DateTime<Utc>),
}

impl Ledger {
    /// Recomputes the balance of a pair from the movement log.
    ///
    /// - Starts from the latest active opening balance, unless the log holds
    ///   `opening_balance` movements for the pair, in which case it starts
    ///   from zero and folds those movements in.
    /// - Sums the signed amounts of every canonical movement, chronologically,
    ///   up to and including `as_of` when given.
    /// - Ignores the before/after snapshots stored on movements.
    ///
    /// Read-only and repeatable: the same log always yields the same amount.
    pub async fn project(
        &self,
        location_id: &str,
        currency_id: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> ResultLedger<Amount> {
        let key = BalanceKey::new(location_id.trim(), currency_id.trim());
        project_with(&self.database, &key, as_of.map(Cutoff::Inclusive)).await
    }

    /// Canonical movements of a pair in replay order, for audit views.
    pub async fn movements(
        &self,
        location_id: &str,
        currency_id: &str,
    ) -> ResultLedger<Vec<MovementEntry>> {
        let key = BalanceKey::new(location_id.trim(), currency_id.trim());
        let models = canonical_movements(&key).all(&self.database).await?;
        models.into_iter().map(MovementEntry::try_from).collect()
    }
}

fn pair_movements(key: &BalanceKey) -> Select<movements::Entity> {
    movements::Entity::find()
        .filter(movements::Column::LocationId.eq(key.location_id.as_str()))
        .filter(movements::Column::CurrencyId.eq(key.currency_id.as_str()))
}

fn canonical_movements(key: &BalanceKey) -> Select<movements::Entity> {
    pair_movements(key)
        .filter(movements::Column::Kind.is_in(MovementKind::canonical_labels()))
        .order_by_asc(movements::Column::OccurredAt)
        .order_by_asc(movements::Column::Id)
}

pub(crate) async fn project_with<C: ConnectionTrait>(
    db: &C,
    key: &BalanceKey,
    cutoff: Option<Cutoff>,
) -> ResultLedger<Amount> {
    let baseline = baseline(db, key).await?;

    let mut query = canonical_movements(key);
    query = match cutoff {
        Some(Cutoff::Inclusive(at)) => query.filter(movements::Column::OccurredAt.lte(at)),
        Some(Cutoff::Exclusive(at)) => query.filter(movements::Column::OccurredAt.lt(at)),
        None => query,
    };
    let signed_amounts: Vec<i64> = query
        .select_only()
        .column(movements::Column::SignedAmount)
        .into_tuple()
        .all(db)
        .await?;

    signed_amounts
        .into_iter()
        .map(Amount::new)
        .try_fold(baseline, |running, signed| running.checked_add(signed))
        .ok_or_else(|| LedgerError::InvalidAmount(format!("projection overflow for {key}")))
}

/// Opening amount the projection of `key` starts from.
pub(crate) async fn baseline<C: ConnectionTrait>(
    db: &C,
    key: &BalanceKey,
) -> ResultLedger<Amount> {
    if !uses_opening_table(db, key).await? {
        return Ok(Amount::ZERO);
    }

    let latest = opening_balances::Entity::find()
        .filter(opening_balances::Column::LocationId.eq(key.location_id.as_str()))
        .filter(opening_balances::Column::CurrencyId.eq(key.currency_id.as_str()))
        .filter(opening_balances::Column::Active.eq(true))
        .order_by_desc(opening_balances::Column::AssignedAt)
        .one(db)
        .await?;
    Ok(latest.map_or(Amount::ZERO, |model| Amount::new(model.amount)))
}

/// `true` if the opening-balance table is the projector baseline for `key`.
pub(crate) async fn uses_opening_table<C: ConnectionTrait>(
    db: &C,
    key: &BalanceKey,
) -> ResultLedger<bool> {
    let logged_openings = pair_movements(key)
        .filter(movements::Column::Kind.eq(MovementKind::OpeningBalance.as_str()))
        .count(db)
        .await?;
    Ok(logged_openings == 0)
}

/// Sum of positive and of negative canonical movements in `[from, to)`.
pub(crate) async fn flows_between<C: ConnectionTrait>(
    db: &C,
    key: &BalanceKey,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> ResultLedger<(Amount, Amount)> {
    let signed_amounts: Vec<i64> = canonical_movements(key)
        .filter(movements::Column::OccurredAt.gte(from))
        .filter(movements::Column::OccurredAt.lt(to))
        .select_only()
        .column(movements::Column::SignedAmount)
        .into_tuple()
        .all(db)
        .await?;

    let context = format!("daily flows of {key}");
    let mut inflows = Amount::ZERO;
    let mut outflows = Amount::ZERO;
    for signed in signed_amounts.into_iter().map(Amount::new) {
        if signed.is_positive() {
            inflows = inflows.try_add(signed, &context)?;
        } else {
            outflows = outflows.try_add(signed, &context)?;
        }
    }
    Ok((inflows, outflows))
}

/// Stored movements of `key` whose kind is not canonical. They are never
/// replayed.
pub(crate) async fn legacy_entry_count<C: ConnectionTrait>(
    db: &C,
    key: &BalanceKey,
) -> ResultLedger<u64> {
    pair_movements(key)
        .filter(movements::Column::Kind.is_not_in(MovementKind::canonical_labels()))
        .count(db)
        .await
        .map_err(Into::into)
}
