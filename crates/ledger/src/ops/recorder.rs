use chrono::Utc;
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
    prelude::*, sea_query::Expr,
};

use crate::{
    Amount, BalanceKey, BalanceSnapshot, CachedBalance, Channel, LedgerError, MovementEntry,
    MovementKind, OpeningBalance, OpeningBalanceCmd, RecordCmd, ResultLedger, balances,
    ensure_consistent, movements, normalize, opening_balances,
    util::{normalize_optional_text, require_id},
};

use super::{
    Ledger,
    projector::{baseline, uses_opening_table},
    with_tx,
};

impl Ledger {
    /// Records one movement and moves the cached balance with it.
    ///
    /// Caller input is validated before any transaction is opened. Inside
    /// the transaction the cached balance is read, the new balance computed
    /// and checked, the cached row written and the movement appended; any
    /// failure rolls back both.
    pub async fn record(&self, cmd: RecordCmd) -> ResultLedger<MovementEntry> {
        let cmd = prepare_record(cmd)?;
        let key = cmd.key();

        let entry = {
            let _guard = self.locks.acquire(std::slice::from_ref(&key)).await;
            with_tx!(self, |db_tx| self.record_in(&db_tx, &cmd).await)?
        };

        tracing::info!(
            movement_id = %entry.id,
            location_id = %entry.location_id,
            currency_id = %entry.currency_id,
            kind = %entry.kind,
            signed_amount = %entry.signed_amount,
            reference = %entry.reference.kind,
            "movement recorded"
        );
        Ok(entry)
    }

    /// Recorder steps for a caller that already holds the pair lock and owns
    /// the transaction.
    pub(crate) async fn record_in(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &RecordCmd,
    ) -> ResultLedger<MovementEntry> {
        let key = cmd.key();
        let mut balance = load_cached(db_tx, &key).await?;

        // The first logged opening balance replaces the table baseline.
        if cmd.kind == MovementKind::OpeningBalance {
            let table_baseline = baseline(db_tx, &key).await?;
            if !table_baseline.is_zero() {
                balance.apply(Channel::Cash, -table_baseline)?;
            }
        }

        let balance_before = balance.quantity;
        let signed_amount = normalize(cmd.kind, cmd.amount)?;
        let balance_after = balance_before
            .checked_add(signed_amount)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("balance overflow for {key}")))?;
        ensure_consistent(cmd.kind, signed_amount, balance_before, balance_after)?;

        if cmd.kind == MovementKind::Expense && balance_before < signed_amount.abs() {
            return Err(LedgerError::InsufficientBalance {
                location_id: key.location_id,
                currency_id: key.currency_id,
                available: balance_before,
                requested: signed_amount.abs(),
            });
        }
        if signed_amount.is_zero() {
            tracing::debug!(%key, "recording a zero adjustment");
        }

        balance.apply(cmd.channel, signed_amount)?;
        store_cached(db_tx, &balance).await?;

        let entry = MovementEntry::new(
            key.location_id,
            key.currency_id,
            cmd.kind,
            signed_amount,
            cmd.reference.clone(),
            cmd.channel,
            cmd.description.clone(),
            cmd.actor_id.clone(),
            cmd.occurred_at,
            BalanceSnapshot {
                before: balance_before,
                after: balance_after,
            },
        );
        movements::ActiveModel::from(&entry).insert(db_tx).await?;
        Ok(entry)
    }

    /// Assigns the opening balance of a pair.
    ///
    /// Earlier opening balances are kept but deactivated. While the pair has
    /// no `opening_balance` movement, the table is the projector's baseline,
    /// so the cached balance shifts by the difference with the previous
    /// baseline to stay in step with the projection. No movement is written.
    pub async fn assign_opening_balance(
        &self,
        cmd: OpeningBalanceCmd,
    ) -> ResultLedger<OpeningBalance> {
        let key = BalanceKey::new(
            require_id(&cmd.location_id, "location_id")?,
            require_id(&cmd.currency_id, "currency_id")?,
        );
        let actor_id = require_id(&cmd.actor_id, "actor_id")?;
        if cmd.amount.is_negative() {
            return Err(LedgerError::InvalidAmount(
                "opening balance must be >= 0".to_string(),
            ));
        }

        let opening = {
            let _guard = self.locks.acquire(std::slice::from_ref(&key)).await;
            with_tx!(self, |db_tx| {
                let previous = opening_balances::Entity::find()
                    .filter(opening_balances::Column::LocationId.eq(key.location_id.as_str()))
                    .filter(opening_balances::Column::CurrencyId.eq(key.currency_id.as_str()))
                    .filter(opening_balances::Column::Active.eq(true))
                    .order_by_desc(opening_balances::Column::AssignedAt)
                    .one(&db_tx)
                    .await?
                    .map_or(Amount::ZERO, |model| Amount::new(model.amount));

                opening_balances::Entity::update_many()
                    .col_expr(opening_balances::Column::Active, Expr::value(false))
                    .filter(opening_balances::Column::LocationId.eq(key.location_id.as_str()))
                    .filter(opening_balances::Column::CurrencyId.eq(key.currency_id.as_str()))
                    .filter(opening_balances::Column::Active.eq(true))
                    .exec(&db_tx)
                    .await?;

                let opening = OpeningBalance::new(key.clone(), cmd.amount, actor_id);
                opening_balances::ActiveModel::from(&opening)
                    .insert(&db_tx)
                    .await?;

                if uses_opening_table(&db_tx, &key).await? {
                    let shift = cmd.amount.try_sub(previous, "opening balance shift")?;
                    if !shift.is_zero() {
                        let mut balance = load_cached(&db_tx, &key).await?;
                        balance.apply(Channel::Cash, shift)?;
                        store_cached(&db_tx, &balance).await?;
                    }
                }
                Ok(opening)
            })?
        };

        tracing::info!(
            location_id = %key.location_id,
            currency_id = %key.currency_id,
            amount = %opening.amount,
            "opening balance assigned"
        );
        Ok(opening)
    }
}

/// Validates and trims a record command. Runs before any transaction.
pub(crate) fn prepare_record(mut cmd: RecordCmd) -> ResultLedger<RecordCmd> {
    cmd.location_id = require_id(&cmd.location_id, "location_id")?;
    cmd.currency_id = require_id(&cmd.currency_id, "currency_id")?;
    cmd.actor_id = require_id(&cmd.actor_id, "actor_id")?;
    cmd.reference.id = require_id(&cmd.reference.id, "reference_id")?;
    cmd.description = normalize_optional_text(cmd.description.as_deref());
    normalize(cmd.kind, cmd.amount)?;
    Ok(cmd)
}

/// Current cached row of `key`, or an empty view if the pair has none yet.
pub(crate) async fn load_cached<C: ConnectionTrait>(
    db: &C,
    key: &BalanceKey,
) -> ResultLedger<CachedBalance> {
    Ok(balances::Entity::find_by_id(key.primary_key())
        .one(db)
        .await?
        .map_or_else(|| CachedBalance::empty(key.clone()), CachedBalance::from))
}

/// Writes `balance` back, inserting the row if it was never stored.
///
/// Existing rows are only updated if their version is still the one that was
/// read, so a writer in another process cannot be silently overwritten.
pub(crate) async fn store_cached<C: ConnectionTrait>(
    db: &C,
    balance: &CachedBalance,
) -> ResultLedger<()> {
    let key = &balance.key;
    let conflict =
        || LedgerError::ConcurrentModification(format!("cached balance {key} changed"));

    if balance.version == 0 {
        let model: balances::ActiveModel = balance.into();
        return match balances::Entity::insert(model).exec_without_returning(db).await {
            Ok(_) => Ok(()),
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Err(conflict()),
                _ => Err(err.into()),
            },
        };
    }

    let result = balances::Entity::update_many()
        .col_expr(balances::Column::Quantity, Expr::value(balance.quantity.minor()))
        .col_expr(
            balances::Column::CashQuantity,
            Expr::value(balance.cash_quantity.minor()),
        )
        .col_expr(
            balances::Column::BankQuantity,
            Expr::value(balance.bank_quantity.minor()),
        )
        .col_expr(balances::Column::Version, Expr::value(balance.version + 1))
        .col_expr(balances::Column::UpdatedAt, Expr::value(Utc::now()))
        .col_expr(
            balances::Column::ReconciledAt,
            Expr::value(balance.reconciled_at),
        )
        .col_expr(
            balances::Column::ReconciledBy,
            Expr::value(balance.reconciled_by.clone()),
        )
        .filter(balances::Column::LocationId.eq(key.location_id.as_str()))
        .filter(balances::Column::CurrencyId.eq(key.currency_id.as_str()))
        .filter(balances::Column::Version.eq(balance.version))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(conflict());
    }
    Ok(())
}
