//! Transfer Engine
//!
//! Runs one transfer as a single unit of work:
//!
//! ```text
//! validate ─▶ begin ─▶ lock accounts (ascending id) ─▶ convert ─▶ check funds
//!          ─▶ create transfer ─▶ credit entry ─▶ debit entry
//!          ─▶ adjust balances (ascending id) ─▶ commit
//! ```
//!
//! Any failure after `begin` rolls the unit of work back, so a transfer is
//! either fully visible (transfer, two entries, two balances) or not at all.
//! Dropping the `execute` future mid-flight drops the unit of work, which
//! aborts it the same way.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::TransferError;
use super::lock_order::{apply_deltas, lock_accounts};
use super::types::{TransferRequest, TransferResult};
use crate::currency::CurrencyConverter;
use crate::ledger::{LedgerStore, NewEntry, NewTransfer, UnitOfWork};

/// Tracing target for committed transfers
pub const AUDIT_TARGET: &str = "ledger_audit";

/// Atomic funds-transfer engine.
///
/// Holds no mutable state of its own; share it across tasks behind an `Arc`.
pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
    converter: Arc<CurrencyConverter>,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn LedgerStore>, converter: Arc<CurrencyConverter>) -> Self {
        Self { store, converter }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn converter(&self) -> &CurrencyConverter {
        &self.converter
    }

    /// Execute a transfer in its own unit of work.
    ///
    /// # Errors
    /// * Validation errors - before any storage access
    /// * `DuplicateRequest` - `cid` already used by a committed transfer
    /// * `AccountNotFound` / `InsufficientFunds` / `AmountTooSmall` - rolled back, nothing written
    /// * `Storage` - rolled back; safe to retry, including with the same `cid`
    pub async fn execute(&self, req: &TransferRequest) -> Result<TransferResult, TransferError> {
        req.validate(&self.converter)?;

        if let Some(cid) = &req.cid
            && let Some(existing) = self.store.get_transfer_by_cid(cid).await?
        {
            debug!(cid = %cid, transfer_id = existing.id, "Duplicate cid found");
            return Err(TransferError::DuplicateRequest {
                cid: cid.clone(),
                transfer_id: Some(existing.id),
            });
        }

        let mut uow = self.store.begin().await?;

        let result = match self.execute_in(uow.as_mut(), req).await {
            Ok(result) => result,
            Err(e) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                debug!(
                    from = req.from_account_id,
                    to = req.to_account_id,
                    code = e.code(),
                    "Transfer rejected: {}",
                    e
                );
                return Err(self.resolve_duplicate(e).await);
            }
        };

        if let Err(e) = uow.commit().await {
            warn!(
                from = req.from_account_id,
                to = req.to_account_id,
                store = self.store.name(),
                error = %e,
                "Transfer commit failed"
            );
            return Err(self.resolve_duplicate(e.into()).await);
        }

        info!(
            target: AUDIT_TARGET,
            transfer_id = result.transfer.id,
            from = result.transfer.from_account_id,
            to = result.transfer.to_account_id,
            amount = %result.transfer.amount,
            currency = %result.transfer.currency,
            debit = %result.from_entry.amount,
            credit = %result.to_entry.amount,
            "Transfer committed"
        );

        Ok(result)
    }

    /// Run the transfer inside a caller-owned unit of work without committing.
    ///
    /// On error the caller must roll `uow` back; writes already staged by this
    /// call are not undone individually.
    pub async fn execute_in(
        &self,
        uow: &mut dyn UnitOfWork,
        req: &TransferRequest,
    ) -> Result<TransferResult, TransferError> {
        req.validate(&self.converter)?;

        let mut locked = lock_accounts(uow, &[req.from_account_id, req.to_account_id]).await?;
        let from = locked
            .remove(&req.from_account_id)
            .ok_or(TransferError::AccountNotFound(req.from_account_id))?;
        let to = locked
            .remove(&req.to_account_id)
            .ok_or(TransferError::AccountNotFound(req.to_account_id))?;

        let debit_amount = self
            .converter
            .convert(&req.currency, &from.currency, req.amount)?;
        let credit_amount = self
            .converter
            .convert(&req.currency, &to.currency, req.amount)?;

        // Both legs must survive rounding, otherwise value moves one way only
        if debit_amount.is_zero() || credit_amount.is_zero() {
            return Err(TransferError::AmountTooSmall {
                debit: debit_amount,
                credit: credit_amount,
            });
        }

        if debit_amount > from.balance {
            return Err(TransferError::InsufficientFunds {
                account_id: from.id,
                available: from.balance,
                required: debit_amount,
            });
        }

        let transfer = uow
            .create_transfer(&NewTransfer {
                from_account_id: from.id,
                to_account_id: to.id,
                amount: req.amount,
                currency: req.currency.clone(),
                cid: req.cid.clone(),
            })
            .await?;

        let to_entry = uow
            .create_entry(&NewEntry {
                account_id: to.id,
                transfer_id: Some(transfer.id),
                amount: credit_amount,
            })
            .await?;
        let from_entry = uow
            .create_entry(&NewEntry {
                account_id: from.id,
                transfer_id: Some(transfer.id),
                amount: -debit_amount,
            })
            .await?;
        debug_assert!(from_entry.is_debit() && to_entry.is_credit());

        let mut updated =
            apply_deltas(uow, &[(from.id, -debit_amount), (to.id, credit_amount)]).await?;
        let from_account = updated
            .remove(&from.id)
            .ok_or(TransferError::AccountNotFound(from.id))?;
        let to_account = updated
            .remove(&to.id)
            .ok_or(TransferError::AccountNotFound(to.id))?;

        debug!(
            transfer_id = transfer.id,
            debit = %debit_amount,
            credit = %credit_amount,
            "Transfer staged"
        );

        Ok(TransferResult {
            transfer,
            from_account,
            to_account,
            from_entry,
            to_entry,
        })
    }

    /// Fill in the winning transfer id for a cid conflict detected at write time
    async fn resolve_duplicate(&self, err: TransferError) -> TransferError {
        match err {
            TransferError::DuplicateRequest {
                cid,
                transfer_id: None,
            } => {
                let transfer_id = match self.store.get_transfer_by_cid(&cid).await {
                    Ok(existing) => existing.map(|t| t.id),
                    Err(e) => {
                        debug!(cid = %cid, error = %e, "Duplicate cid lookup failed");
                        None
                    }
                };
                TransferError::DuplicateRequest { cid, transfer_id }
            }
            other => other,
        }
    }
}
