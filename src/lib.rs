//! # fundwatch - Autonomous Account Funding for Blockchain Nodes
//!
//! fundwatch keeps designated recipient accounts topped up from a funding
//! account. A monitor is registered over a holding kind (native coin, asset
//! or currency) and an account property name; every account carrying that
//! property, set by the funding account itself, becomes a monitored account.
//! When a monitored balance falls below its threshold, a background worker
//! builds and broadcasts a funding transfer, subject to a per-account
//! cooldown measured in committed blocks.
//!
//! ## Core Concepts
//!
//! - **Monitor**: an operator-registered funding policy, identified by
//!   (holding kind, holding id, property name, funding account)
//! - **Monitored account**: one account's instantiation of a monitor, with
//!   parameters overridable through the property value string
//! - **Funding parameters**: transfer amount, trigger threshold, and the
//!   cooldown interval in blocks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fundwatch::{
//!     AccountId, FundingCredential, FundingMonitor, FundingMonitorConfig,
//!     FundingParams, HoldingId, HoldingKind, LedgerEvent, MonitorSpec,
//! };
//!
//! let monitor = FundingMonitor::new(FundingMonitorConfig::default(), ledger, gateway);
//! monitor.start_monitor(MonitorSpec::new(
//!     HoldingKind::Coin,
//!     HoldingId::NONE,
//!     "funding",
//!     FundingParams { amount: 100, threshold: 50, interval: 10 },
//!     FundingCredential::new(AccountId::new(42), secret),
//! ))?;
//!
//! // The node delivers ledger events as chain state changes.
//! monitor.handle_event(LedgerEvent::BlockCommitted { height: 1000 });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod account;
pub mod error;
pub mod ledger;
pub mod monitor;
pub mod tx;

// Re-export primary types at crate root for convenience
pub use account::{AccountId, Address, HoldingId, HoldingKind};
pub use error::{ConfigError, FundingError, FundingResult};
pub use ledger::{
    AccountProperty, AccountView, InMemoryLedger, LedgerError, LedgerEvent, LedgerReader,
};
pub use monitor::{
    FundingMonitor, FundingMonitorConfig, FundingParams, MonitorKey, MonitorSnapshot, MonitorSpec,
    MIN_FUND_AMOUNT, MIN_FUND_INTERVAL, MIN_FUND_THRESHOLD,
};
pub use tx::{
    FundingCredential, GatewayError, MemoryGateway, SignedTransfer, TransactionId, TransferDraft,
    TransferGateway, TransferPayload, TRANSFER_DEADLINE_BLOCKS,
};
