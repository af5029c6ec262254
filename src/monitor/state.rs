//! Lock decision state machine.
//!
//! # States
//! - Unknown: no successful read yet; NOT treated as unlocked
//! - NoLoan / ActiveOk: device free
//! - OverdueLock / DefaultedLock: device restricted
//!
//! # State Transitions
//! ```text
//! any → NoLoan:        read returns no record
//! any → ActiveOk:      status Active or Paid
//! any → OverdueLock:   status Overdue
//! any → DefaultedLock: status Defaulted
//! read failure:        state unchanged (fail safe)
//! ```

use serde::Serialize;

use crate::chain::types::{LoanRecord, LoanSnapshot, LoanStatus};

/// Published lock decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LockState {
    /// No completed read yet. Renderers must not treat this as unlocked.
    Unknown,
    /// No loan outstanding.
    NoLoan,
    /// Loan outstanding and in good standing (or already repaid).
    ActiveOk,
    /// Loan overdue: device restricted until repaid.
    OverdueLock,
    /// Loan defaulted: device restricted.
    DefaultedLock,
}

impl LockState {
    /// Whether this state restricts the device.
    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::OverdueLock | LockState::DefaultedLock)
    }

    /// Whether this state reflects a completed read.
    pub fn is_verified(&self) -> bool {
        !matches!(self, LockState::Unknown)
    }
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            LockState::Unknown => "unknown",
            LockState::NoLoan => "no_loan",
            LockState::ActiveOk => "active_ok",
            LockState::OverdueLock => "overdue_lock",
            LockState::DefaultedLock => "defaulted_lock",
        };
        f.write_str(text)
    }
}

/// Pure transition function from an observed record to a lock decision.
pub fn next_state(record: Option<&LoanRecord>) -> LockState {
    match record {
        None => LockState::NoLoan,
        Some(record) => match record.status {
            LoanStatus::Active | LoanStatus::Paid => LockState::ActiveOk,
            LoanStatus::Overdue => LockState::OverdueLock,
            LoanStatus::Defaulted => LockState::DefaultedLock,
        },
    }
}

/// What the monitor publishes to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    /// Current lock decision.
    pub state: LockState,
    /// Display view of the record behind the decision, if any.
    pub loan: Option<LoanSnapshot>,
    /// Time of the last successful read (seconds since epoch). `None` until
    /// the first read completes; goes stale while the RPC is unreachable so
    /// renderers can say "unable to verify status".
    pub verified_at: Option<u64>,
    /// Reads failed since the last success.
    pub consecutive_failures: u32,
}

impl MonitorSnapshot {
    /// State before any read has completed.
    pub fn initial() -> Self {
        Self {
            state: LockState::Unknown,
            loan: None,
            verified_at: None,
            consecutive_failures: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn record(status: LoanStatus) -> LoanRecord {
        LoanRecord {
            principal: U256::from(100),
            max_payment_date: 2_000_000,
            status,
            created_at: 1_000_000,
            is_overdue_flag: matches!(status, LoanStatus::Overdue),
        }
    }

    #[test]
    fn test_transition_covers_every_status() {
        assert_eq!(next_state(None), LockState::NoLoan);
        assert_eq!(next_state(Some(&record(LoanStatus::Active))), LockState::ActiveOk);
        assert_eq!(next_state(Some(&record(LoanStatus::Paid))), LockState::ActiveOk);
        assert_eq!(next_state(Some(&record(LoanStatus::Overdue))), LockState::OverdueLock);
        assert_eq!(next_state(Some(&record(LoanStatus::Defaulted))), LockState::DefaultedLock);
    }

    #[test]
    fn test_locked_set() {
        assert!(LockState::OverdueLock.is_locked());
        assert!(LockState::DefaultedLock.is_locked());
        assert!(!LockState::NoLoan.is_locked());
        assert!(!LockState::ActiveOk.is_locked());
        // Unknown is neither locked nor a license to unlock.
        assert!(!LockState::Unknown.is_locked());
        assert!(!LockState::Unknown.is_verified());
    }

    #[test]
    fn test_initial_snapshot_is_unverified() {
        let snap = MonitorSnapshot::initial();
        assert_eq!(snap.state, LockState::Unknown);
        assert!(snap.verified_at.is_none());
        assert!(snap.loan.is_none());
    }
}
