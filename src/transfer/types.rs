//! Transfer request and result types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::TransferError;
use crate::core_types::AccountId;
use crate::currency::CurrencyConverter;
use crate::ledger::{Account, Entry, Transfer};

/// Inbound transfer request.
///
/// Authorization to debit `from_account_id` is checked before the engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub currency: String,
    /// Client idempotency key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

impl TransferRequest {
    pub fn new(
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
            currency: currency.into(),
            cid: None,
        }
    }

    pub fn with_cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    /// Input checks that need no storage access
    pub fn validate(&self, converter: &CurrencyConverter) -> Result<(), TransferError> {
        if self.amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount);
        }
        if self.from_account_id == self.to_account_id {
            return Err(TransferError::SameAccount);
        }
        if !converter.is_supported(&self.currency) {
            return Err(TransferError::UnsupportedCurrency(self.currency.clone()));
        }
        Ok(())
    }
}

/// Everything one committed transfer produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}
