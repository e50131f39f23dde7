//! Ledger Store
//!
//! Accounts, transfers and entries, plus the unit of work that scopes
//! every write. Two backends implement [`LedgerStore`]:
//!
//! - [`PgLedger`]: PostgreSQL transactions with row-level locks
//! - [`MemoryLedger`]: in-process tables with per-account async locks
//!
//! Both give the same guarantees: writes made through a unit of work are
//! invisible to readers until `commit()`, and a row lock taken with
//! `get_account_for_update` is held until the unit of work ends.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod state;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryLedger;
pub use models::{Account, Entry, NewEntry, NewTransfer, Transfer};
pub use postgres::PgLedger;
pub use state::UnitOfWorkState;
pub use store::{LedgerStore, UnitOfWork};
