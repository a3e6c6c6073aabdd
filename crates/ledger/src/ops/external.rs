use sea_orm::TransactionTrait;

use crate::{
    ExternalPostingCmd, MovementEntry, RecordCmd, Reference, ReferenceKind, ResultLedger,
    util::require_id,
};

use super::{Ledger, recorder::prepare_record, with_tx};

impl Ledger {
    /// Posts the cashflow of an external service (bill payments, remittance
    /// payouts, card top-ups...) at a location.
    ///
    /// Inflows are recorded as income, outflows as expenses; the service name
    /// becomes the movement description.
    pub async fn post_external(&self, cmd: ExternalPostingCmd) -> ResultLedger<MovementEntry> {
        let posting_id = require_id(&cmd.posting_id, "posting_id")?;
        let service = require_id(&cmd.service, "service")?;
        let record = prepare_record(
            RecordCmd::new(
                cmd.location_id,
                cmd.currency_id,
                cmd.direction.movement_kind(),
                cmd.amount,
                cmd.actor_id,
                Reference::new(ReferenceKind::ExternalPosting, posting_id),
                cmd.occurred_at,
            )
            .description(service)
            .channel(cmd.channel),
        )?;
        let key = record.key();

        let entry = {
            let _guard = self.locks.acquire(std::slice::from_ref(&key)).await;
            with_tx!(self, |db_tx| self.record_in(&db_tx, &record).await)?
        };

        tracing::info!(
            posting_id = %entry.reference.id,
            location_id = %entry.location_id,
            currency_id = %entry.currency_id,
            signed_amount = %entry.signed_amount,
            "external posting recorded"
        );
        self.reconcile_after_commit(std::slice::from_ref(&key), &entry.actor_id)
            .await;
        Ok(entry)
    }
}
