use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};

use crate::{
    LedgerError, MovementEntry, ResultLedger, TransferCmd,
    util::{normalize_optional_text, require_id},
};

use super::{Ledger, recorder::prepare_record, with_tx};

/// Both sides of a settled transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer_id: String,
    /// Expense at the origin location.
    pub debit: MovementEntry,
    /// Income at the destination location.
    pub credit: MovementEntry,
}

impl Ledger {
    /// Moves `amount` of one currency from one location to another.
    ///
    /// The debit and the credit commit together or not at all; an origin
    /// without enough funds aborts the whole transfer with
    /// [`LedgerError::InsufficientBalance`].
    pub async fn settle_transfer(&self, mut cmd: TransferCmd) -> ResultLedger<TransferReceipt> {
        cmd.transfer_id = require_id(&cmd.transfer_id, "transfer_id")?;
        let note = normalize_optional_text(cmd.note.as_deref());
        let debit = prepare_record(cmd.debit(note.clone()))?;
        let credit = prepare_record(cmd.credit(note))?;
        if debit.location_id == credit.location_id {
            return Err(LedgerError::InvalidAmount(
                "origin and destination locations must differ".to_string(),
            ));
        }
        let keys = [debit.key(), credit.key()];

        let receipt = {
            let _guard = self.locks.acquire(&keys).await;
            with_tx!(self, |db_tx| {
                let debit = self.record_in(&db_tx, &debit).await?;
                let credit = self.record_in(&db_tx, &credit).await?;
                Ok(TransferReceipt {
                    transfer_id: cmd.transfer_id.clone(),
                    debit,
                    credit,
                })
            })?
        };

        tracing::info!(
            transfer_id = %receipt.transfer_id,
            from = %receipt.debit.location_id,
            to = %receipt.credit.location_id,
            currency_id = %receipt.credit.currency_id,
            amount = %receipt.credit.signed_amount,
            "transfer settled"
        );
        self.reconcile_after_commit(&keys, &receipt.debit.actor_id)
            .await;
        Ok(receipt)
    }
}
