//! Ledger collaborator interface.
//!
//! The funding monitor consumes the ledger through the [`LedgerReader`]
//! trait and the [`LedgerEvent`] notification enum. The node process is
//! expected to provide a backend over its account store and to deliver
//! events synchronously and in order per source; [`InMemoryLedger`] is a
//! thread-safe reference backend for embedded usage and tests.

mod memory;
mod traits;

pub use memory::InMemoryLedger;
pub use traits::{AccountProperty, AccountView, LedgerError, LedgerEvent, LedgerReader};
