//! In-Memory Ledger Store
//!
//! Process-local implementation of [`LedgerStore`] with the same locking and
//! visibility rules as the PostgreSQL store:
//!
//! - Each account has a `tokio::sync::Mutex` row lock. A unit of work keeps the
//!   owned guard until it commits, aborts or is dropped.
//! - Writes are staged inside the unit of work and applied under one table lock
//!   at commit, so readers see either the full pre-state or the full post-state.
//! - Ids come from sequences that are consumed even by aborted units of work.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::{debug, warn};

use super::error::StoreError;
use super::models::{Account, Entry, NewEntry, NewTransfer, Transfer};
use super::state::UnitOfWorkState;
use super::store::{LedgerStore, UnitOfWork};
use crate::core_types::{AccountId, EntryId, TransferId};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<EntryId, Entry>,
    transfers: BTreeMap<TransferId, Transfer>,
    cids: HashMap<String, TransferId>,
    account_seq: AccountId,
    entry_seq: EntryId,
    transfer_seq: TransferId,
}

struct Shared {
    row_locks: DashMap<AccountId, Arc<RowLock<()>>>,
    tables: Mutex<Tables>,
    fail_next_commit: AtomicBool,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory ledger
pub struct MemoryLedger {
    shared: Arc<Shared>,
    lock_timeout: Duration,
}

impl MemoryLedger {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                row_locks: DashMap::new(),
                tables: Mutex::new(Tables::default()),
                fail_next_commit: AtomicBool::new(false),
            }),
            lock_timeout,
        }
    }

    /// Seed an account with an opening balance
    pub fn open_account(&self, owner: &str, currency: &str, balance: Decimal) -> Account {
        let account = {
            let mut tables = self.shared.tables();
            tables.account_seq += 1;
            let account = Account {
                id: tables.account_seq,
                owner: owner.to_string(),
                currency: currency.to_string(),
                balance,
                created_at: Utc::now(),
            };
            tables.accounts.insert(account.id, account.clone());
            account
        };
        self.shared
            .row_locks
            .insert(account.id, Arc::new(RowLock::new(())));

        debug!(account_id = account.id, currency = %account.currency, "Account opened");
        account
    }

    /// Make the next `commit()` on any unit of work fail after its writes are staged
    pub fn fail_next_commit(&self) {
        self.shared.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of committed (entries, transfers)
    pub fn row_counts(&self) -> (usize, usize) {
        let tables = self.shared.tables();
        (tables.entries.len(), tables.transfers.len())
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(MemoryUnitOfWork::new(
            Arc::clone(&self.shared),
            self.lock_timeout,
        )))
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.shared.tables().accounts.get(&id).cloned())
    }

    async fn get_transfer(&self, id: TransferId) -> Result<Option<Transfer>, StoreError> {
        Ok(self.shared.tables().transfers.get(&id).cloned())
    }

    async fn get_transfer_by_cid(&self, cid: &str) -> Result<Option<Transfer>, StoreError> {
        let tables = self.shared.tables();
        Ok(tables
            .cids
            .get(cid)
            .and_then(|id| tables.transfers.get(id))
            .cloned())
    }

    async fn get_entry(&self, id: EntryId) -> Result<Option<Entry>, StoreError> {
        Ok(self.shared.tables().entries.get(&id).cloned())
    }

    async fn list_entries(&self, account_id: AccountId) -> Result<Vec<Entry>, StoreError> {
        Ok(self
            .shared
            .tables()
            .entries
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn list_transfers(&self, account_id: AccountId) -> Result<Vec<Transfer>, StoreError> {
        Ok(self
            .shared
            .tables()
            .transfers
            .values()
            .filter(|t| t.from_account_id == account_id || t.to_account_id == account_id)
            .cloned()
            .collect())
    }
}

/// Unit of work over [`MemoryLedger`]
pub struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    lock_timeout: Duration,
    state: UnitOfWorkState,
    held: BTreeMap<AccountId, OwnedMutexGuard<()>>,
    working: BTreeMap<AccountId, Account>,
    dirty: BTreeSet<AccountId>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl MemoryUnitOfWork {
    fn new(shared: Arc<Shared>, lock_timeout: Duration) -> Self {
        Self {
            shared,
            lock_timeout,
            state: UnitOfWorkState::Pending,
            held: BTreeMap::new(),
            working: BTreeMap::new(),
            dirty: BTreeSet::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        }
    }

    fn ensure_pending(&self) -> Result<(), StoreError> {
        if self.state.is_terminal() {
            return Err(StoreError::Closed(self.state));
        }
        Ok(())
    }

    fn ensure_exists(&self, id: AccountId) -> Result<(), StoreError> {
        if self.shared.row_locks.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::AccountNotFound(id))
        }
    }

    /// Acquire the row lock (once) and return the working copy
    async fn lock_row(&mut self, id: AccountId) -> Result<&mut Account, StoreError> {
        if !self.held.contains_key(&id) {
            let row_lock = self
                .shared
                .row_locks
                .get(&id)
                .map(|lock| Arc::clone(lock.value()))
                .ok_or(StoreError::AccountNotFound(id))?;

            let guard = tokio::time::timeout(self.lock_timeout, row_lock.lock_owned())
                .await
                .map_err(|_| {
                    warn!(account_id = id, timeout = ?self.lock_timeout, "Row lock wait timed out");
                    StoreError::LockTimeout(id)
                })?;

            let account = self
                .shared
                .tables()
                .accounts
                .get(&id)
                .cloned()
                .ok_or(StoreError::AccountNotFound(id))?;

            self.held.insert(id, guard);
            self.working.insert(id, account);
        }

        self.working
            .get_mut(&id)
            .ok_or(StoreError::AccountNotFound(id))
    }

    /// Drop staged writes and release row locks
    fn abort(&mut self) {
        self.state = UnitOfWorkState::Aborted;
        self.discard();
    }

    fn discard(&mut self) {
        self.entries.clear();
        self.transfers.clear();
        self.dirty.clear();
        self.working.clear();
        self.held.clear();
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn state(&self) -> UnitOfWorkState {
        self.state
    }

    async fn get_account_for_update(&mut self, id: AccountId) -> Result<Account, StoreError> {
        self.ensure_pending()?;
        Ok(self.lock_row(id).await?.clone())
    }

    async fn create_transfer(&mut self, transfer: &NewTransfer) -> Result<Transfer, StoreError> {
        self.ensure_pending()?;
        self.ensure_exists(transfer.from_account_id)?;
        self.ensure_exists(transfer.to_account_id)?;

        if let Some(cid) = &transfer.cid
            && self.transfers.iter().any(|t| t.cid.as_ref() == Some(cid))
        {
            return Err(StoreError::DuplicateCid(cid.clone()));
        }

        let record = {
            let mut tables = self.shared.tables();
            if let Some(cid) = &transfer.cid
                && tables.cids.contains_key(cid)
            {
                return Err(StoreError::DuplicateCid(cid.clone()));
            }
            tables.transfer_seq += 1;
            Transfer {
                id: tables.transfer_seq,
                from_account_id: transfer.from_account_id,
                to_account_id: transfer.to_account_id,
                amount: transfer.amount,
                currency: transfer.currency.clone(),
                cid: transfer.cid.clone(),
                created_at: Utc::now(),
            }
        };

        self.transfers.push(record.clone());
        Ok(record)
    }

    async fn create_entry(&mut self, entry: &NewEntry) -> Result<Entry, StoreError> {
        self.ensure_pending()?;
        self.ensure_exists(entry.account_id)?;

        let record = {
            let mut tables = self.shared.tables();
            tables.entry_seq += 1;
            Entry {
                id: tables.entry_seq,
                account_id: entry.account_id,
                transfer_id: entry.transfer_id,
                amount: entry.amount,
                created_at: Utc::now(),
            }
        };

        self.entries.push(record.clone());
        Ok(record)
    }

    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: Decimal,
    ) -> Result<Account, StoreError> {
        self.ensure_pending()?;
        let account = self.lock_row(id).await?;
        account.balance = account
            .balance
            .checked_add(delta)
            .ok_or(StoreError::BalanceOverflow(id))?;
        let snapshot = account.clone();
        self.dirty.insert(id);
        Ok(snapshot)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_pending()?;

        if self.shared.fail_next_commit.swap(false, Ordering::SeqCst) {
            self.abort();
            return Err(StoreError::CommitFailed(
                "injected failure before commit".to_string(),
            ));
        }

        let result = {
            let mut tables = self.shared.tables();
            let conflict = self
                .transfers
                .iter()
                .filter_map(|t| t.cid.as_ref())
                .find(|cid| tables.cids.contains_key(*cid))
                .cloned();

            match conflict {
                Some(cid) => Err(StoreError::DuplicateCid(cid)),
                None => {
                    for id in &self.dirty {
                        if let Some(account) = self.working.get(id) {
                            tables.accounts.insert(*id, account.clone());
                        }
                    }
                    for entry in self.entries.drain(..) {
                        tables.entries.insert(entry.id, entry);
                    }
                    for transfer in self.transfers.drain(..) {
                        if let Some(cid) = &transfer.cid {
                            tables.cids.insert(cid.clone(), transfer.id);
                        }
                        tables.transfers.insert(transfer.id, transfer);
                    }
                    Ok(())
                }
            }
        };

        match &result {
            Ok(()) => {
                self.state = UnitOfWorkState::Committed;
                self.discard();
            }
            Err(_) => self.abort(),
        }
        result
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        match self.state {
            UnitOfWorkState::Pending => {
                self.abort();
                Ok(())
            }
            UnitOfWorkState::Aborted => Ok(()),
            UnitOfWorkState::Committed => Err(StoreError::Closed(self.state)),
        }
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if self.state == UnitOfWorkState::Pending && !self.held.is_empty() {
            debug!(
                locked_accounts = self.held.len(),
                "Unit of work dropped while pending, discarding staged writes"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ledger() -> MemoryLedger {
        MemoryLedger::new(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_staged_writes_invisible_until_commit() {
        let ledger = ledger();
        let a = ledger.open_account("alice", "USD", dec!(100));

        let mut uow = ledger.begin().await.unwrap();
        let updated = uow.add_account_balance(a.id, dec!(-40)).await.unwrap();
        assert_eq!(updated.balance, dec!(60));
        uow.create_entry(&NewEntry {
            account_id: a.id,
            transfer_id: None,
            amount: dec!(-40),
        })
        .await
        .unwrap();

        // Outside readers still see the committed state
        assert_eq!(ledger.get_account(a.id).await.unwrap().unwrap().balance, dec!(100));
        assert!(ledger.list_entries(a.id).await.unwrap().is_empty());

        uow.commit().await.unwrap();
        assert_eq!(uow.state(), UnitOfWorkState::Committed);

        assert_eq!(ledger.get_account(a.id).await.unwrap().unwrap().balance, dec!(60));
        assert_eq!(ledger.list_entries(a.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_everything() {
        let ledger = ledger();
        let a = ledger.open_account("alice", "USD", dec!(100));
        let b = ledger.open_account("bob", "USD", dec!(0));

        let mut uow = ledger.begin().await.unwrap();
        uow.create_transfer(&NewTransfer {
            from_account_id: a.id,
            to_account_id: b.id,
            amount: dec!(10),
            currency: "USD".to_string(),
            cid: Some("t-1".to_string()),
        })
        .await
        .unwrap();
        uow.add_account_balance(b.id, dec!(10)).await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(uow.state(), UnitOfWorkState::Aborted);
        assert_eq!(ledger.row_counts(), (0, 0));
        assert_eq!(ledger.get_account(b.id).await.unwrap().unwrap().balance, dec!(0));
        assert!(ledger.get_transfer_by_cid("t-1").await.unwrap().is_none());

        // Rolling back twice is harmless, writing afterwards is not
        uow.rollback().await.unwrap();
        assert_eq!(
            uow.add_account_balance(b.id, dec!(1)).await,
            Err(StoreError::Closed(UnitOfWorkState::Aborted))
        );
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_unit_until_timeout() {
        let ledger = ledger();
        let a = ledger.open_account("alice", "USD", dec!(100));

        let mut first = ledger.begin().await.unwrap();
        first.get_account_for_update(a.id).await.unwrap();

        let mut second = ledger.begin().await.unwrap();
        assert_eq!(
            second.get_account_for_update(a.id).await,
            Err(StoreError::LockTimeout(a.id))
        );

        // Releasing the first lock lets a new waiter in
        first.rollback().await.unwrap();
        let account = second.get_account_for_update(a.id).await.unwrap();
        assert_eq!(account.balance, dec!(100));
    }

    #[tokio::test]
    async fn test_dropping_unit_releases_locks() {
        let ledger = ledger();
        let a = ledger.open_account("alice", "USD", dec!(100));

        {
            let mut uow = ledger.begin().await.unwrap();
            uow.add_account_balance(a.id, dec!(5)).await.unwrap();
        }

        let mut uow = ledger.begin().await.unwrap();
        let account = uow.get_account_for_update(a.id).await.unwrap();
        assert_eq!(account.balance, dec!(100));
    }

    #[tokio::test]
    async fn test_reads_do_not_block_on_row_locks() {
        let ledger = ledger();
        let a = ledger.open_account("alice", "USD", dec!(100));

        let mut uow = ledger.begin().await.unwrap();
        uow.get_account_for_update(a.id).await.unwrap();

        let read = tokio::time::timeout(Duration::from_millis(10), ledger.get_account(a.id)).await;
        assert!(read.is_ok());
    }

    #[tokio::test]
    async fn test_injected_commit_failure_aborts() {
        let ledger = ledger();
        let a = ledger.open_account("alice", "USD", dec!(100));

        ledger.fail_next_commit();
        let mut uow = ledger.begin().await.unwrap();
        uow.add_account_balance(a.id, dec!(-1)).await.unwrap();
        uow.create_entry(&NewEntry {
            account_id: a.id,
            transfer_id: None,
            amount: dec!(-1),
        })
        .await
        .unwrap();

        assert!(matches!(uow.commit().await, Err(StoreError::CommitFailed(_))));
        assert_eq!(uow.state(), UnitOfWorkState::Aborted);
        assert_eq!(ledger.row_counts(), (0, 0));
        assert_eq!(ledger.get_account(a.id).await.unwrap().unwrap().balance, dec!(100));

        // Injection is one-shot
        let mut uow = ledger.begin().await.unwrap();
        uow.add_account_balance(a.id, dec!(-1)).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(ledger.get_account(a.id).await.unwrap().unwrap().balance, dec!(99));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let ledger = ledger();
        let mut uow = ledger.begin().await.unwrap();

        assert_eq!(
            uow.get_account_for_update(404).await,
            Err(StoreError::AccountNotFound(404))
        );
        assert_eq!(
            uow.create_entry(&NewEntry {
                account_id: 404,
                transfer_id: None,
                amount: dec!(1),
            })
            .await,
            Err(StoreError::AccountNotFound(404))
        );
        assert!(ledger.get_account(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_cid_rejected() {
        let ledger = ledger();
        let a = ledger.open_account("alice", "USD", dec!(100));
        let b = ledger.open_account("bob", "USD", dec!(0));
        let new_transfer = NewTransfer {
            from_account_id: a.id,
            to_account_id: b.id,
            amount: dec!(1),
            currency: "USD".to_string(),
            cid: Some("dup".to_string()),
        };

        // Two open units race on the same cid: the loser fails at commit
        let mut first = ledger.begin().await.unwrap();
        let mut second = ledger.begin().await.unwrap();
        let created = first.create_transfer(&new_transfer).await.unwrap();
        second.create_transfer(&new_transfer).await.unwrap();

        first.commit().await.unwrap();
        assert_eq!(
            second.commit().await,
            Err(StoreError::DuplicateCid("dup".to_string()))
        );
        assert_eq!(second.state(), UnitOfWorkState::Aborted);

        // Once committed the cid is rejected at insert time
        let mut third = ledger.begin().await.unwrap();
        assert_eq!(
            third.create_transfer(&new_transfer).await,
            Err(StoreError::DuplicateCid("dup".to_string()))
        );

        let stored = ledger.get_transfer_by_cid("dup").await.unwrap().unwrap();
        assert_eq!(stored.id, created.id);
        assert_eq!(ledger.list_transfers(b.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_balance_overflow_is_an_error() {
        let ledger = ledger();
        let a = ledger.open_account("whale", "USD", Decimal::MAX);

        let mut uow = ledger.begin().await.unwrap();
        assert_eq!(
            uow.add_account_balance(a.id, dec!(1)).await,
            Err(StoreError::BalanceOverflow(a.id))
        );

        // The working copy is untouched and still usable
        let account = uow.add_account_balance(a.id, dec!(-1)).await.unwrap();
        assert_eq!(account.balance, Decimal::MAX - dec!(1));
        uow.rollback().await.unwrap();
        assert_eq!(ledger.get_account(a.id).await.unwrap().unwrap().balance, Decimal::MAX);
    }

    #[tokio::test]
    async fn test_commit_twice_is_closed() {
        let ledger = ledger();
        let mut uow = ledger.begin().await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(
            uow.commit().await,
            Err(StoreError::Closed(UnitOfWorkState::Committed))
        );
        assert_eq!(
            uow.rollback().await,
            Err(StoreError::Closed(UnitOfWorkState::Committed))
        );
    }
}
