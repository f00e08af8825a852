//! In-memory ledger backend.
//!
//! Thread-safe reference implementation of [`LedgerReader`] for embedded
//! usage and tests. Mutators return errors rather than panicking so the
//! backend can be shared across threads safely.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::account::{AccountId, HoldingId, HoldingKind};
use crate::ledger::traits::{AccountProperty, AccountView, LedgerError, LedgerReader};

fn lock_err(context: &'static str) -> LedgerError {
    LedgerError::Backend(format!("poisoned lock: {context}"))
}

#[derive(Debug, Clone, Default)]
struct AccountRecord {
    balance: u64,
    unconfirmed_balance: u64,
    assets: HashMap<HoldingId, u64>,
    currencies: HashMap<HoldingId, u64>,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<AccountId, AccountRecord>,
    properties: Vec<AccountProperty>,
    height: u64,
    last_block_time: Option<DateTime<Utc>>,
}

/// Thread-safe in-memory ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    /// Create an empty ledger at height zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an account with the given balances.
    pub fn put_account(
        &self,
        id: AccountId,
        balance: u64,
        unconfirmed_balance: u64,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.write().map_err(|_| lock_err("put_account"))?;
        let record = state.accounts.entry(id).or_default();
        record.balance = balance;
        record.unconfirmed_balance = unconfirmed_balance;
        Ok(())
    }

    /// Remove an account entirely.
    pub fn remove_account(&self, id: AccountId) -> Result<(), LedgerError> {
        let mut state = self.state.write().map_err(|_| lock_err("remove_account"))?;
        state.accounts.remove(&id);
        Ok(())
    }

    /// Set an asset or currency quantity for an account.
    ///
    /// Creates the account record if it does not exist yet. Setting a
    /// [`HoldingKind::Coin`] quantity rewrites the confirmed balance.
    pub fn set_holding(
        &self,
        id: AccountId,
        kind: HoldingKind,
        holding: HoldingId,
        quantity: u64,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.write().map_err(|_| lock_err("set_holding"))?;
        let record = state.accounts.entry(id).or_default();
        match kind {
            HoldingKind::Coin => record.balance = quantity,
            HoldingKind::Asset => {
                record.assets.insert(holding, quantity);
            }
            HoldingKind::Currency => {
                record.currencies.insert(holding, quantity);
            }
        }
        Ok(())
    }

    /// Set or replace a property identified by (account, setter, name).
    pub fn set_property(&self, property: AccountProperty) -> Result<(), LedgerError> {
        let mut state = self.state.write().map_err(|_| lock_err("set_property"))?;
        if let Some(existing) = state.properties.iter_mut().find(|p| {
            p.account == property.account && p.setter == property.setter && p.name == property.name
        }) {
            existing.value = property.value;
        } else {
            state.properties.push(property);
        }
        Ok(())
    }

    /// Delete a property; returns the removed record if it existed.
    pub fn delete_property(
        &self,
        account: AccountId,
        setter: AccountId,
        name: &str,
    ) -> Result<Option<AccountProperty>, LedgerError> {
        let mut state = self.state.write().map_err(|_| lock_err("delete_property"))?;
        let pos = state
            .properties
            .iter()
            .position(|p| p.account == account && p.setter == setter && p.name == name);
        Ok(pos.map(|i| state.properties.remove(i)))
    }

    /// Advance the chain by one block; returns the new height.
    pub fn advance_block(&self, at: DateTime<Utc>) -> Result<u64, LedgerError> {
        let mut state = self.state.write().map_err(|_| lock_err("advance_block"))?;
        state.height += 1;
        state.last_block_time = Some(at);
        Ok(state.height)
    }

    /// Advance the chain by `blocks` blocks at the given timestamp.
    pub fn advance_blocks(&self, blocks: u64, at: DateTime<Utc>) -> Result<u64, LedgerError> {
        let mut state = self.state.write().map_err(|_| lock_err("advance_blocks"))?;
        state.height += blocks;
        state.last_block_time = Some(at);
        Ok(state.height)
    }
}

impl LedgerReader for InMemoryLedger {
    fn account(&self, id: AccountId) -> Result<Option<AccountView>, LedgerError> {
        let state = self.state.read().map_err(|_| lock_err("account"))?;
        Ok(state.accounts.get(&id).map(|record| AccountView {
            id,
            balance: record.balance,
            unconfirmed_balance: record.unconfirmed_balance,
        }))
    }

    fn holding_balance(
        &self,
        id: AccountId,
        kind: HoldingKind,
        holding: HoldingId,
    ) -> Result<u64, LedgerError> {
        let state = self.state.read().map_err(|_| lock_err("holding_balance"))?;
        let Some(record) = state.accounts.get(&id) else {
            return Ok(0);
        };
        let quantity = match kind {
            HoldingKind::Coin => record.balance,
            HoldingKind::Asset => record.assets.get(&holding).copied().unwrap_or(0),
            HoldingKind::Currency => record.currencies.get(&holding).copied().unwrap_or(0),
        };
        Ok(quantity)
    }

    fn properties(
        &self,
        setter: Option<AccountId>,
        name: &str,
        from: usize,
        to: usize,
    ) -> Result<Vec<AccountProperty>, LedgerError> {
        let state = self.state.read().map_err(|_| lock_err("properties"))?;
        Ok(state
            .properties
            .iter()
            .filter(|p| p.name == name && setter.map_or(true, |s| p.setter == s))
            .skip(from)
            .take(to.saturating_sub(from))
            .cloned()
            .collect())
    }

    fn height(&self) -> u64 {
        self.state.read().map(|s| s.height).unwrap_or(0)
    }

    fn last_block_time(&self) -> DateTime<Utc> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.last_block_time)
            .unwrap_or_else(Utc::now)
    }
}
