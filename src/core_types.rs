//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and match the `BIGSERIAL` keys of the ledger tables.

/// Account ID - globally unique, immutable after assignment.
///
/// # Constraints:
/// - **Immutable**: Once assigned, NEVER changes
/// - **Totally ordered**: The lock protocol acquires rows in ascending `AccountId` order
pub type AccountId = i64;

/// Entry ID - unique within the ledger
pub type EntryId = i64;

/// Transfer ID - unique within the ledger
pub type TransferId = i64;
