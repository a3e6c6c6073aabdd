//! In-process serialization of writers per (location, currency) pair.
//!
//! Every writer locks the pairs it touches *before* opening its database
//! transaction. Keys are sorted and deduplicated so two writers touching the
//! same pairs always lock them in the same order.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::BalanceKey;

#[derive(Clone, Debug, Default)]
pub(crate) struct PairLocks {
    slots: Arc<Mutex<HashMap<BalanceKey, Arc<AsyncMutex<()>>>>>,
}

/// Held locks; released on drop.
#[derive(Debug)]
pub(crate) struct PairGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl PairLocks {
    pub(crate) async fn acquire(&self, keys: &[BalanceKey]) -> PairGuard {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let slot = self.slot(key);
            guards.push(slot.lock_owned().await);
        }
        PairGuard { _guards: guards }
    }

    fn slot(&self, key: BalanceKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key).or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_pair_is_exclusive() {
        let locks = PairLocks::default();
        let key = BalanceKey::new("centro", "USD");

        let guard = locks.acquire(&[key.clone()]).await;
        let second = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&[key.clone()]),
        )
        .await;
        assert!(second.is_err());

        drop(guard);
        let third =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(&[key])).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn duplicate_keys_do_not_self_deadlock() {
        let locks = PairLocks::default();
        let key = BalanceKey::new("centro", "USD");
        let acquired = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&[key.clone(), key]),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn different_pairs_do_not_block() {
        let locks = PairLocks::default();
        let _usd = locks.acquire(&[BalanceKey::new("centro", "USD")]).await;
        let eur = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&[BalanceKey::new("centro", "EUR")]),
        )
        .await;
        assert!(eur.is_ok());
    }
}
