//! Transfer Error Types
//!
//! Three classes, matching when each is detected:
//! - **Validation**: bad input, rejected before any lock is taken
//! - **Business rule**: detected under locks, before any write
//! - **Storage**: the unit of work could not finish; nothing was written

use rust_decimal::Decimal;
use thiserror::Error;

use crate::core_types::{AccountId, TransferId};
use crate::currency::CurrencyError;
use crate::ledger::StoreError;

/// Error class, used by callers to decide between reject and retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    BusinessRule,
    Storage,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Source and destination account cannot be the same")]
    SameAccount,

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Amount is too small: converts to debit {debit}, credit {credit}")]
    AmountTooSmall { debit: Decimal, credit: Decimal },

    #[error("Amount would cause overflow")]
    Overflow,

    // === Business Rule Errors ===
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error(
        "Insufficient funds in account {account_id}: available {available}, required {required}"
    )]
    InsufficientFunds {
        account_id: AccountId,
        available: Decimal,
        required: Decimal,
    },

    #[error("Duplicate request (cid {cid} already exists)")]
    DuplicateRequest {
        cid: String,
        /// Transfer already holding the cid, when it could be looked up
        transfer_id: Option<TransferId>,
    },

    // === Storage Errors ===
    #[error("Storage failure: {0}")]
    Storage(StoreError),

    #[error("Internal system error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            TransferError::AmountTooSmall { .. } => "AMOUNT_TOO_SMALL",
            TransferError::Overflow => "OVERFLOW",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::DuplicateRequest { .. } => "DUPLICATE_REQUEST",
            TransferError::Storage(StoreError::LockTimeout(_)) => "LOCK_TIMEOUT",
            TransferError::Storage(StoreError::CommitFailed(_)) => "COMMIT_FAILED",
            TransferError::Storage(_) => "STORAGE_FAILURE",
            TransferError::Internal(_) => "SYSTEM_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::InvalidAmount
            | TransferError::SameAccount
            | TransferError::UnsupportedCurrency(_)
            | TransferError::AmountTooSmall { .. }
            | TransferError::Overflow => 400,
            TransferError::AccountNotFound(_) => 404,
            TransferError::DuplicateRequest { .. } => 409,
            TransferError::InsufficientFunds { .. } => 422,
            TransferError::Storage(StoreError::LockTimeout(_)) => 503,
            TransferError::Storage(_) | TransferError::Internal(_) => 500,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::InvalidAmount
            | TransferError::SameAccount
            | TransferError::UnsupportedCurrency(_)
            | TransferError::AmountTooSmall { .. }
            | TransferError::Overflow => ErrorKind::Validation,
            TransferError::AccountNotFound(_)
            | TransferError::InsufficientFunds { .. }
            | TransferError::DuplicateRequest { .. } => ErrorKind::BusinessRule,
            TransferError::Storage(_) | TransferError::Internal(_) => ErrorKind::Storage,
        }
    }

    /// Whether resubmitting the same request may succeed.
    ///
    /// Only storage faults qualify; a failed unit of work leaves nothing behind,
    /// so a retry with the same cid executes normally.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound(id) => TransferError::AccountNotFound(id),
            StoreError::BalanceOverflow(_) => TransferError::Overflow,
            StoreError::DuplicateCid(cid) => TransferError::DuplicateRequest {
                cid,
                transfer_id: None,
            },
            other => TransferError::Storage(other),
        }
    }
}

impl From<CurrencyError> for TransferError {
    fn from(e: CurrencyError) -> Self {
        match e {
            CurrencyError::UnsupportedCurrency(code) => TransferError::UnsupportedCurrency(code),
            CurrencyError::Overflow { .. } => TransferError::Overflow,
            CurrencyError::InvalidRate { .. } | CurrencyError::InvalidBase(_) => {
                TransferError::Internal(e.to_string())
            }
        }
    }
}
