//! Ledger Store Error Types

use thiserror::Error;

use super::state::UnitOfWorkState;
use crate::core_types::AccountId;

/// PostgreSQL SQLSTATE codes the store classifies
pub(crate) mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const LOCK_NOT_AVAILABLE: &str = "55P03";
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Timed out waiting for lock on account {0}")]
    LockTimeout(AccountId),

    #[error("Balance of account {0} would overflow")]
    BalanceOverflow(AccountId),

    #[error("Transfer with cid {0} already exists")]
    DuplicateCid(String),

    #[error("Unit of work already {0}")]
    Closed(UnitOfWorkState),

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Whether the same request may succeed if simply tried again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::LockTimeout(_) | StoreError::CommitFailed(_) | StoreError::Database(_)
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// SQLSTATE of a database error, if the driver reported one
pub(crate) fn sqlstate_of(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(StoreError::LockTimeout(1).is_retryable());
        assert!(StoreError::CommitFailed("io".into()).is_retryable());
        assert!(StoreError::Database("conn reset".into()).is_retryable());

        assert!(!StoreError::AccountNotFound(1).is_retryable());
        assert!(!StoreError::BalanceOverflow(1).is_retryable());
        assert!(!StoreError::DuplicateCid("abc".into()).is_retryable());
        assert!(!StoreError::Closed(UnitOfWorkState::Committed).is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(StoreError::AccountNotFound(42).to_string(), "Account not found: 42");
        assert_eq!(
            StoreError::Closed(UnitOfWorkState::Aborted).to_string(),
            "Unit of work already ABORTED"
        );
    }

    #[test]
    fn test_from_sqlx_without_sqlstate() {
        let err = sqlx::Error::PoolTimedOut;
        assert!(sqlstate_of(&err).is_none());
        assert!(matches!(StoreError::from(err), StoreError::Database(_)));
    }
}
