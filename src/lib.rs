//! Ledger Engine - Atomic Multi-Currency Funds Transfers
//!
//! Double-entry transfers between accounts held in different currencies,
//! safe under arbitrary concurrent load.
//!
//! # Modules
//!
//! - [`core_types`] - Identifier aliases (AccountId, EntryId, TransferId)
//! - [`config`] - YAML application config
//! - [`currency`] - Fixed-rate currency converter
//! - [`ledger`] - Ledger store contract, PostgreSQL and in-memory backends
//! - [`transfer`] - Ordered lock protocol and the transfer engine
//! - [`db`] - PostgreSQL connection pool
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod currency;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use core_types::{AccountId, EntryId, TransferId};
pub use currency::{CurrencyConverter, CurrencyError};
pub use ledger::{
    Account, Entry, LedgerStore, MemoryLedger, PgLedger, StoreError, Transfer, UnitOfWork,
};
pub use transfer::{TransferEngine, TransferError, TransferRequest, TransferResult};
