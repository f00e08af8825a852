//! Shared registry of monitors and monitored accounts.
//!
//! The registry holds the ordered list of active monitor definitions and the
//! map from target account to its monitored accounts. All registry access is
//! serialized by the facade's single mutex; monitored-account funding state
//! carries its own lock so the worker can update it without entering the
//! registry critical section.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::account::{AccountId, Address};
use crate::monitor::policy::{FundingParams, MonitorDefinition, MonitorKey};

/// Mutable funding state for one monitored account.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FundingState {
    /// Effective funding parameters (defaults with overrides applied).
    pub params: FundingParams,
    /// Height of the last successful funding; zero if never funded.
    pub last_funded_height: u64,
}

/// A target account's instantiation of a monitor's policy.
///
/// Owned by the registry while active and shared with the pending queue;
/// queue entries keep a detached account alive after its monitor stops so
/// in-flight checks still run to completion.
#[derive(Debug)]
pub struct MonitoredAccount {
    account_id: AccountId,
    monitor: Arc<MonitorDefinition>,
    state: Mutex<FundingState>,
}

impl MonitoredAccount {
    pub(crate) fn new(
        account_id: AccountId,
        monitor: Arc<MonitorDefinition>,
        params: FundingParams,
    ) -> Self {
        Self {
            account_id,
            monitor,
            state: Mutex::new(FundingState {
                params,
                last_funded_height: 0,
            }),
        }
    }

    /// The target account identifier.
    #[must_use]
    pub const fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// The owning monitor.
    #[must_use]
    pub const fn monitor(&self) -> &Arc<MonitorDefinition> {
        &self.monitor
    }

    /// Current funding parameters (rewritten in place by property updates).
    #[must_use]
    pub fn params(&self) -> FundingParams {
        self.funding_state().params
    }

    /// Height of the last successful funding; zero if never funded.
    #[must_use]
    pub fn last_funded_height(&self) -> u64 {
        self.funding_state().last_funded_height
    }

    /// Diagnostic address of the target account.
    #[must_use]
    pub fn address(&self) -> Address {
        self.account_id.address()
    }

    pub(crate) fn funding_state(&self) -> FundingState {
        // The state is a plain copy struct; a poisoned lock cannot leave it
        // torn, so recover the value.
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_params(&self, params: FundingParams) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .params = params;
    }

    pub(crate) fn record_funded(&self, height: u64) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_funded_height = height;
    }

    /// Queue identity: at most one pending check per (account, monitor).
    pub(crate) fn identity(&self) -> (AccountId, MonitorKey) {
        (self.account_id, self.monitor.key().clone())
    }
}

/// Registry collections. Guarded by a single mutex in the facade.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    monitors: Vec<Arc<MonitorDefinition>>,
    accounts: HashMap<AccountId, Vec<Arc<MonitoredAccount>>>,
}

impl Registry {
    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    pub fn contains(&self, key: &MonitorKey) -> bool {
        self.find(key).is_some()
    }

    pub fn find(&self, key: &MonitorKey) -> Option<&Arc<MonitorDefinition>> {
        self.monitors.iter().find(|m| m.key() == key)
    }

    pub fn monitors(&self) -> &[Arc<MonitorDefinition>] {
        &self.monitors
    }

    /// Publish a monitor. The caller has already checked identity uniqueness.
    pub fn publish(&mut self, monitor: Arc<MonitorDefinition>) {
        self.monitors.push(monitor);
    }

    /// Insert a monitored account under its target account id.
    ///
    /// Event ingestion locates and updates existing entries instead of
    /// inserting duplicates, so at most one entry exists per
    /// (account, monitor) pair.
    pub fn insert_account(&mut self, account: Arc<MonitoredAccount>) {
        self.accounts
            .entry(account.account_id())
            .or_default()
            .push(account);
    }

    /// Monitored accounts for a target account id; empty if none.
    pub fn accounts_for(&self, id: AccountId) -> &[Arc<MonitoredAccount>] {
        self.accounts.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Remove a monitor and every monitored account it owns, pruning emptied
    /// map entries. Returns the removed definition.
    pub fn remove_monitor(&mut self, key: &MonitorKey) -> Option<Arc<MonitorDefinition>> {
        let pos = self.monitors.iter().position(|m| m.key() == key)?;
        let monitor = self.monitors.remove(pos);
        self.accounts.retain(|_, list| {
            list.retain(|account| account.monitor().key() != key);
            !list.is_empty()
        });
        Some(monitor)
    }

    /// Remove every monitored account under `account` whose owning monitor is
    /// tied to `property`, pruning the map entry if emptied. Returns the
    /// removed entries.
    pub fn remove_property(
        &mut self,
        account: AccountId,
        property: &str,
    ) -> Vec<Arc<MonitoredAccount>> {
        let Some(list) = self.accounts.get_mut(&account) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        list.retain(|entry| {
            if entry.monitor().key().property() == property {
                removed.push(Arc::clone(entry));
                false
            } else {
                true
            }
        });
        if list.is_empty() {
            self.accounts.remove(&account);
        }
        removed
    }

    /// Clear all monitors and accounts; returns the prior monitor count.
    pub fn clear(&mut self) -> usize {
        let count = self.monitors.len();
        self.monitors.clear();
        self.accounts.clear();
        count
    }
}
