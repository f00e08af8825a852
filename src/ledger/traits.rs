//! Abstract ledger traits and notification types.
//!
//! These define the contract the node's account store must implement for the
//! funding monitor. The trait is read-only: the monitor never mutates ledger
//! state directly, it only submits transfers through the gateway.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::account::{AccountId, HoldingId, HoldingKind};

/// Errors that can occur during ledger access.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Backend error.
    #[error("Ledger backend error: {0}")]
    Backend(String),
}

/// Point-in-time view of an account's native-coin balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountView {
    /// Account identifier.
    pub id: AccountId,
    /// Confirmed native-coin balance.
    pub balance: u64,
    /// Native-coin balance including unconfirmed transactions.
    pub unconfirmed_balance: u64,
}

/// A named property attached to an account by a setter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProperty {
    /// Account the property is attached to.
    pub account: AccountId,
    /// Account that set the property.
    pub setter: AccountId,
    /// Property name.
    pub name: String,
    /// Optional property value (funding override string, see
    /// [`FundingParams::with_overrides`](crate::monitor::FundingParams::with_overrides)).
    pub value: Option<String>,
}

/// Ledger state change notifications consumed by the funding monitor.
///
/// Delivery is synchronous and in order per source. Ordering across
/// independent sources is not guaranteed, but `BlockCommitted` fires only
/// after all of that block's transactions have updated the ledger, so
/// funding decisions observe post-block balances.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    /// An account's native-coin balance changed.
    CoinBalance {
        /// Affected account.
        account: AccountId,
        /// New confirmed balance.
        balance: u64,
    },

    /// An account's asset balance changed.
    AssetBalance {
        /// Affected account.
        account: AccountId,
        /// Asset identifier.
        asset: HoldingId,
        /// New asset quantity.
        balance: u64,
    },

    /// An account's currency units changed.
    CurrencyBalance {
        /// Affected account.
        account: AccountId,
        /// Currency identifier.
        currency: HoldingId,
        /// New currency units.
        units: u64,
    },

    /// A property was set (created or updated) on an account.
    PropertySet(AccountProperty),

    /// A property was deleted from an account.
    PropertyDeleted(AccountProperty),

    /// A block was committed at the given height.
    BlockCommitted {
        /// Height of the committed block.
        height: u64,
    },
}

/// Read access to ledger account state.
pub trait LedgerReader: Send + Sync {
    /// Look up an account. Returns `Ok(None)` if the account does not exist.
    fn account(&self, id: AccountId) -> Result<Option<AccountView>, LedgerError>;

    /// Quantity of the given holding owned by `id`.
    ///
    /// Absent holdings read as zero. For [`HoldingKind::Coin`] this is the
    /// confirmed coin balance and `holding` is ignored.
    fn holding_balance(
        &self,
        id: AccountId,
        kind: HoldingKind,
        holding: HoldingId,
    ) -> Result<u64, LedgerError>;

    /// Accounts currently carrying property `name`.
    ///
    /// `setter` scopes the scan to properties set by that account; `from`
    /// (inclusive) and `to` (exclusive) bound the result range for bulk
    /// control.
    fn properties(
        &self,
        setter: Option<AccountId>,
        name: &str,
        from: usize,
        to: usize,
    ) -> Result<Vec<AccountProperty>, LedgerError>;

    /// Current chain height.
    fn height(&self) -> u64;

    /// Timestamp of the last committed block.
    fn last_block_time(&self) -> DateTime<Utc>;
}
