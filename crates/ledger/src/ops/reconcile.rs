use chrono::Utc;
use sea_orm::{QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    Amount, BalanceKey, CachedBalance, ResultLedger, balances,
    util::require_id,
};

use super::{
    Ledger,
    projector::{legacy_entry_count, project_with},
    recorder::{load_cached, store_cached},
    with_tx,
};

/// Outcome of reconciling one pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub location_id: String,
    pub currency_id: String,
    pub previous_cached: Amount,
    pub projected: Amount,
    /// `previous_cached - projected`.
    pub delta: Amount,
    pub corrected: bool,
}

/// Result of one currency inside [`Ledger::reconcile_all`].
#[derive(Debug)]
pub struct PairOutcome {
    pub currency_id: String,
    pub result: ResultLedger<Reconciliation>,
}

/// A pair whose cached balance disagrees with the movement log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inconsistency {
    pub location_id: String,
    pub currency_id: String,
    pub cached: Amount,
    pub projected: Amount,
    pub delta: Amount,
    /// Stored movements with a non-canonical kind; the projection skips them.
    pub excluded_legacy_entries: u64,
}

impl Ledger {
    /// Cached balance of a pair (an empty view if it was never written).
    pub async fn cached_balance(
        &self,
        location_id: &str,
        currency_id: &str,
    ) -> ResultLedger<CachedBalance> {
        let key = BalanceKey::new(location_id.trim(), currency_id.trim());
        load_cached(&self.database, &key).await
    }

    /// Compares the cached balance of a pair with its projection and, when
    /// they differ by more than [`TOLERANCE`](crate::TOLERANCE), overwrites
    /// the cached quantity with the projection.
    ///
    /// The movement log is never written: the cache is a view of the log, so
    /// the fix is a plain overwrite and running it again is a no-op. The
    /// cash/bank sub-splits are left untouched.
    pub async fn reconcile(
        &self,
        location_id: &str,
        currency_id: &str,
        actor_id: &str,
    ) -> ResultLedger<Reconciliation> {
        let key = BalanceKey::new(
            require_id(location_id, "location_id")?,
            require_id(currency_id, "currency_id")?,
        );
        let actor_id = require_id(actor_id, "actor_id")?;

        let outcome = {
            let _guard = self.locks.acquire(std::slice::from_ref(&key)).await;
            with_tx!(self, |db_tx| {
                let mut balance = load_cached(&db_tx, &key).await?;
                let projected = project_with(&db_tx, &key, None).await?;
                let previous_cached = balance.quantity;
                let delta = previous_cached.try_sub(projected, "reconciliation delta")?;
                let corrected = !previous_cached.within_tolerance(projected);

                if corrected {
                    balance.quantity = projected;
                    balance.reconciled_at = Some(Utc::now());
                    balance.reconciled_by = Some(actor_id.clone());
                    store_cached(&db_tx, &balance).await?;
                }

                Ok(Reconciliation {
                    location_id: key.location_id.clone(),
                    currency_id: key.currency_id.clone(),
                    previous_cached,
                    projected,
                    delta,
                    corrected,
                })
            })?
        };

        if outcome.corrected {
            tracing::warn!(
                location_id = %outcome.location_id,
                currency_id = %outcome.currency_id,
                previous_cached = %outcome.previous_cached,
                projected = %outcome.projected,
                delta = %outcome.delta,
                actor_id = %actor_id,
                "cached balance drifted from the movement log, corrected"
            );
        } else {
            tracing::debug!(%key, delta = %outcome.delta, "cached balance consistent");
        }
        Ok(outcome)
    }

    /// Reconciles every currency that has a cached balance at `location_id`.
    ///
    /// Pairs are handled one after the other and independently: a failure is
    /// logged and reported in its [`PairOutcome`] without stopping the rest.
    pub async fn reconcile_all(
        &self,
        location_id: &str,
        actor_id: &str,
    ) -> ResultLedger<Vec<PairOutcome>> {
        let location_id = require_id(location_id, "location_id")?;
        let currencies: Vec<String> = balances::Entity::find()
            .filter(balances::Column::LocationId.eq(location_id.as_str()))
            .select_only()
            .column(balances::Column::CurrencyId)
            .order_by_asc(balances::Column::CurrencyId)
            .into_tuple()
            .all(&self.database)
            .await?;

        let mut outcomes = Vec::with_capacity(currencies.len());
        for currency_id in currencies {
            let result = self.reconcile(&location_id, &currency_id, actor_id).await;
            if let Err(err) = &result {
                tracing::warn!(
                    location_id = %location_id,
                    currency_id = %currency_id,
                    error = %err,
                    "reconciliation failed"
                );
            }
            outcomes.push(PairOutcome {
                currency_id,
                result,
            });
        }
        Ok(outcomes)
    }

    /// Lists every pair whose cached balance is off its projection by more
    /// than the tolerance. Read-only.
    pub async fn build_inconsistency_report(&self) -> ResultLedger<Vec<Inconsistency>> {
        with_tx!(self, |db_tx| {
            let rows = balances::Entity::find()
                .order_by_asc(balances::Column::LocationId)
                .order_by_asc(balances::Column::CurrencyId)
                .all(&db_tx)
                .await?;

            let mut report = Vec::new();
            for row in rows {
                let balance = CachedBalance::from(row);
                let projected = project_with(&db_tx, &balance.key, None).await?;
                if balance.quantity.within_tolerance(projected) {
                    continue;
                }
                let delta = balance.quantity.try_sub(projected, "reconciliation delta")?;
                let excluded_legacy_entries = legacy_entry_count(&db_tx, &balance.key).await?;
                report.push(Inconsistency {
                    location_id: balance.key.location_id,
                    currency_id: balance.key.currency_id,
                    cached: balance.quantity,
                    projected,
                    delta,
                    excluded_legacy_entries,
                });
            }
            Ok(report)
        })
    }

    /// Locations that have at least one cached balance.
    pub async fn tracked_locations(&self) -> ResultLedger<Vec<String>> {
        let locations: Vec<String> = balances::Entity::find()
            .select_only()
            .column(balances::Column::LocationId)
            .distinct()
            .order_by_asc(balances::Column::LocationId)
            .into_tuple()
            .all(&self.database)
            .await?;
        Ok(locations)
    }
}
