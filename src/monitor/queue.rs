//! Deduplicating pending-work queue.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::account::AccountId;
use crate::monitor::policy::MonitorKey;
use crate::monitor::registry::MonitoredAccount;

/// Unbounded FIFO of monitored accounts awaiting a funding check.
///
/// An entry appears at most once: enqueueing an already-queued entry is a
/// no-op, which bounds redundant work under bursty notification storms.
/// Identity is the (target account, monitor key) pair rather than a linear
/// scan of the queue, and entries hold their own `Arc`, so checks for
/// accounts detached by a monitor stop still drain to completion.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    inner: Mutex<QueueState>,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<Arc<MonitoredAccount>>,
    queued: HashSet<(AccountId, MonitorKey)>,
}

impl PendingQueue {
    /// Append an entry; returns false if it was already queued.
    pub fn enqueue(&self, entry: Arc<MonitoredAccount>) -> bool {
        let mut state = self.lock();
        if !state.queued.insert(entry.identity()) {
            return false;
        }
        state.entries.push_back(entry);
        true
    }

    /// Pop the oldest entry, releasing its identity for re-enqueueing.
    pub fn dequeue(&self) -> Option<Arc<MonitoredAccount>> {
        let mut state = self.lock();
        let entry = state.entries.pop_front()?;
        state.queued.remove(&entry.identity());
        Some(entry)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Both collections are updated together under the lock; a panic
        // cannot occur between the two mutations, so recovery is safe.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{HoldingId, HoldingKind};
    use crate::monitor::policy::{FundingParams, MonitorDefinition, MonitorSpec};
    use crate::tx::FundingCredential;

    fn entry(account: u64, property: &str) -> Arc<MonitoredAccount> {
        let spec = MonitorSpec::new(
            HoldingKind::Coin,
            HoldingId::NONE,
            property,
            FundingParams {
                amount: 5,
                threshold: 10,
                interval: 10,
            },
            FundingCredential::new(AccountId::new(100), "secret phrase"),
        );
        let monitor = Arc::new(MonitorDefinition::new(spec));
        Arc::new(MonitoredAccount::new(
            AccountId::new(account),
            Arc::clone(&monitor),
            monitor.defaults(),
        ))
    }

    #[test]
    fn enqueue_is_idempotent_until_drained() {
        let queue = PendingQueue::default();
        let a = entry(1, "fund");

        assert!(queue.enqueue(Arc::clone(&a)));
        assert!(!queue.enqueue(Arc::clone(&a)));
        assert!(!queue.enqueue(Arc::clone(&a)));
        assert_eq!(queue.len(), 1);

        assert!(queue.dequeue().is_some());
        assert!(queue.dequeue().is_none());

        // Once drained the identity is free again.
        assert!(queue.enqueue(a));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn dedup_is_per_account_and_monitor() {
        let queue = PendingQueue::default();
        let a = entry(1, "fund");
        let b = entry(2, "fund");
        let c = entry(1, "other");

        assert!(queue.enqueue(a));
        assert!(queue.enqueue(b));
        assert!(queue.enqueue(c));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn drains_in_fifo_order() {
        let queue = PendingQueue::default();
        queue.enqueue(entry(1, "fund"));
        queue.enqueue(entry(2, "fund"));
        queue.enqueue(entry(3, "fund"));

        let ids: Vec<u64> = std::iter::from_fn(|| queue.dequeue())
            .map(|e| e.account_id().as_u64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }
}
