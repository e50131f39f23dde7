//! Data models for the double-entry ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, EntryId, TransferId};

/// Customer account holding a balance in one currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub currency: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One signed posting against an account. Debits are negative, credits positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    /// Transfer that produced this entry; `None` for postings made outside the engine
    pub transfer_id: Option<TransferId>,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    #[inline]
    pub fn is_debit(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    #[inline]
    pub fn is_credit(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }
}

/// A funds movement, recorded in the currency the client asked for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub currency: String,
    /// Client idempotency key
    pub cid: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting a transfer
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub currency: String,
    pub cid: Option<String>,
}

/// Parameters for inserting an entry
#[derive(Debug, Clone, Copy)]
pub struct NewEntry {
    pub account_id: AccountId,
    pub transfer_id: Option<TransferId>,
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(amount: Decimal) -> Entry {
        Entry {
            id: 1,
            account_id: 7,
            transfer_id: Some(3),
            amount,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_entry_direction() {
        assert!(entry(dec!(-10.00)).is_debit());
        assert!(!entry(dec!(-10.00)).is_credit());
        assert!(entry(dec!(11.00)).is_credit());
        assert!(!entry(dec!(11.00)).is_debit());
        assert!(!entry(dec!(0)).is_credit());
        assert!(!entry(-dec!(0.00)).is_debit());
    }

    #[test]
    fn test_transfer_serializes_amount_as_string() {
        let transfer = Transfer {
            id: 9,
            from_account_id: 1,
            to_account_id: 2,
            amount: dec!(10.00),
            currency: "USD".to_string(),
            cid: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&transfer).unwrap();
        assert_eq!(json["amount"], "10.00");
        assert_eq!(json["currency"], "USD");
        assert!(json["cid"].is_null());
    }
}
