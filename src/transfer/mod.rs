//! Atomic Funds Transfer
//!
//! Moves money between two accounts, possibly in different currencies, as one
//! double-entry unit of work: one transfer record, one credit entry, one debit
//! entry and two balance updates, all committed together or not at all.
//!
//! # Safety Invariants
//!
//! 1. **Ordered Locking**: accounts are locked and updated in ascending id order
//!    ([`lock_order`]), so concurrent transfers cannot deadlock
//! 2. **No Overdraft**: the converted debit never exceeds the source balance
//! 3. **All or Nothing**: every exit path other than a successful commit leaves
//!    zero visible state change, including a cancelled future
//! 4. **Idempotency**: a `cid` is used by at most one committed transfer

pub mod engine;
pub mod error;
pub mod lock_order;
pub mod types;


// Re-exports for convenience
pub use engine::{AUDIT_TARGET, TransferEngine};
pub use error::{ErrorKind, TransferError};
pub use lock_order::lock_order;
pub use types::{TransferRequest, TransferResult};
