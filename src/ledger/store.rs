//! Ledger Store Contract
//!
//! The transfer engine talks to storage only through these two traits.
//! A [`LedgerStore`] hands out [`UnitOfWork`]s; everything written through a
//! unit of work becomes visible at `commit()` or not at all.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::StoreError;
use super::models::{Account, Entry, NewEntry, NewTransfer, Transfer};
use super::state::UnitOfWorkState;
use crate::core_types::{AccountId, EntryId, TransferId};

/// Transactional ledger storage
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &'static str;

    /// Open a new unit of work in `Pending` state
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Committed snapshot of an account (never blocks on row locks)
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn get_transfer(&self, id: TransferId) -> Result<Option<Transfer>, StoreError>;

    async fn get_transfer_by_cid(&self, cid: &str) -> Result<Option<Transfer>, StoreError>;

    async fn get_entry(&self, id: EntryId) -> Result<Option<Entry>, StoreError>;

    /// All entries posted against an account, oldest first
    async fn list_entries(&self, account_id: AccountId) -> Result<Vec<Entry>, StoreError>;

    /// All transfers touching an account in either direction, oldest first
    async fn list_transfers(&self, account_id: AccountId) -> Result<Vec<Transfer>, StoreError>;
}

/// One atomic boundary of ledger writes.
///
/// Dropping a unit of work that was not committed aborts it.
#[async_trait]
pub trait UnitOfWork: Send {
    fn state(&self) -> UnitOfWorkState;

    /// Read an account and hold its row lock until the unit of work ends.
    ///
    /// Blocks while another unit of work holds the lock, up to the store's
    /// lock timeout.
    async fn get_account_for_update(&mut self, id: AccountId) -> Result<Account, StoreError>;

    async fn create_transfer(&mut self, transfer: &NewTransfer) -> Result<Transfer, StoreError>;

    async fn create_entry(&mut self, entry: &NewEntry) -> Result<Entry, StoreError>;

    /// Add `delta` to an account balance and return the updated snapshot
    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: Decimal,
    ) -> Result<Account, StoreError>;

    /// Make every staged write visible. On error the unit of work is `Aborted`.
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard every staged write
    async fn rollback(&mut self) -> Result<(), StoreError>;
}
