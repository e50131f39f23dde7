//! Unit of Work State Definitions
//!
//! ```text
//! PENDING ──commit()──▶ COMMITTED
//!    │
//!    └──rollback() / commit failure / drop──▶ ABORTED
//! ```

use std::fmt;

/// Lifecycle of one unit of work.
///
/// Terminal states: COMMITTED, ABORTED. Every operation on a unit of work
/// in a terminal state fails with `StoreError::Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOfWorkState {
    /// Writes staged, nothing visible outside the unit of work
    Pending,

    /// Terminal: all writes visible
    Committed,

    /// Terminal: no writes visible
    Aborted,
}

impl UnitOfWorkState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UnitOfWorkState::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfWorkState::Pending => "PENDING",
            UnitOfWorkState::Committed => "COMMITTED",
            UnitOfWorkState::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
