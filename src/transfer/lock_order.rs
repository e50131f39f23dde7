//! Ordered Lock Protocol
//!
//! Any operation that locks more than one account acquires the row locks in
//! ascending account id, whatever role each account plays. Every unit of work
//! therefore requests locks in one global order and no circular wait can form.
//!
//! Balance writes walk the same order, so the acquire phase and the write
//! phase never disagree about who waits for whom.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::core_types::AccountId;
use crate::ledger::{Account, StoreError, UnitOfWork};

/// Ascending, de-duplicated account ids
pub fn lock_order(ids: &[AccountId]) -> Vec<AccountId> {
    let mut ordered = ids.to_vec();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}

/// Lock every account in `ids` for update, in [`lock_order`].
pub async fn lock_accounts(
    uow: &mut dyn UnitOfWork,
    ids: &[AccountId],
) -> Result<BTreeMap<AccountId, Account>, StoreError> {
    let mut locked = BTreeMap::new();
    for id in lock_order(ids) {
        let account = uow.get_account_for_update(id).await?;
        locked.insert(id, account);
    }
    Ok(locked)
}

/// Apply balance deltas in [`lock_order`]. Deltas for the same account are summed.
pub async fn apply_deltas(
    uow: &mut dyn UnitOfWork,
    deltas: &[(AccountId, Decimal)],
) -> Result<BTreeMap<AccountId, Account>, StoreError> {
    let mut totals: BTreeMap<AccountId, Decimal> = BTreeMap::new();
    for (id, delta) in deltas {
        let total = totals.entry(*id).or_default();
        *total = total
            .checked_add(*delta)
            .ok_or(StoreError::BalanceOverflow(*id))?;
    }

    let ids: Vec<AccountId> = deltas.iter().map(|(id, _)| *id).collect();
    let mut updated = BTreeMap::new();
    for id in lock_order(&ids) {
        let delta = totals.get(&id).copied().unwrap_or_default();
        let account = uow.add_account_balance(id, delta).await?;
        updated.insert(id, account);
    }
    Ok(updated)
}
