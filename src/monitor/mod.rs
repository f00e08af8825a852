//! Autonomous balance funding.
//!
//! The monitor subsystem keeps designated accounts topped up from a funding
//! account. Operators register monitors over a holding kind and an account
//! property name; every account carrying the property (set by the funding
//! account) is watched, and whenever its balance sits below the monitor's
//! threshold after the cooldown interval has elapsed, a funding transfer is
//! built and broadcast by a background worker.
//!
//! Entry point is [`FundingMonitor`]; the node feeds it
//! [`crate::ledger::LedgerEvent`]s as chain state changes.

pub mod policy;
pub(crate) mod queue;
pub(crate) mod registry;
pub mod system;
pub(crate) mod worker;

pub use policy::{
    FundingParams, MonitorDefinition, MonitorKey, MonitorSnapshot, MonitorSpec, MIN_FUND_AMOUNT,
    MIN_FUND_INTERVAL, MIN_FUND_THRESHOLD,
};
pub use registry::MonitoredAccount;
pub use system::{FundingMonitor, FundingMonitorConfig};
