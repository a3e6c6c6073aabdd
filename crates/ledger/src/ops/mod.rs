use sea_orm::DatabaseConnection;

use crate::{BalanceKey, BusinessClock, ResultLedger};

mod closing;
mod external;
mod locks;
mod projector;
mod reconcile;
mod recorder;
mod transfers;

pub use reconcile::{Inconsistency, PairOutcome, Reconciliation};
pub use transfers::TransferReceipt;

use locks::PairLocks;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultLedger<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Handle to the ledger.
///
/// The database connection is injected by the host, which also owns its
/// lifecycle. Cloning is cheap and clones share the per-pair write locks, so
/// one process should build a single `Ledger` and clone it around.
#[derive(Clone, Debug)]
pub struct Ledger {
    database: DatabaseConnection,
    clock: BusinessClock,
    locks: PairLocks,
}

impl Ledger {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    pub fn clock(&self) -> &BusinessClock {
        &self.clock
    }

    /// Reconcile `keys` after a business operation committed.
    ///
    /// Failures are logged and swallowed: the operation already succeeded.
    async fn reconcile_after_commit(&self, keys: &[BalanceKey], actor_id: &str) {
        for key in keys {
            if let Err(err) = self
                .reconcile(&key.location_id, &key.currency_id, actor_id)
                .await
            {
                tracing::warn!(
                    location_id = %key.location_id,
                    currency_id = %key.currency_id,
                    error = %err,
                    "post-commit reconciliation failed"
                );
            }
        }
    }
}

/// The builder for `Ledger`
#[derive(Default)]
pub struct LedgerBuilder {
    database: DatabaseConnection,
    clock: BusinessClock,
}

impl LedgerBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> LedgerBuilder {
        self.database = db;
        self
    }

    /// Timezone used to bucket business days (defaults to UTC).
    pub fn clock(mut self, clock: BusinessClock) -> LedgerBuilder {
        self.clock = clock;
        self
    }

    /// Construct `Ledger`
    pub async fn build(self) -> ResultLedger<Ledger> {
        Ok(Ledger {
            database: self.database,
            clock: self.clock,
            locks: PairLocks::default(),
        })
    }
}
