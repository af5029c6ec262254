//! Loan monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! timer tick / force_check()
//!     → poller.rs (single fetch task, coalesced triggers)
//!     → state.rs (pure transition: record → LockState)
//!     → watch channel + ArcSwap snapshot
//!     → subscribers (device controller, app shell)
//!
//! After repayment:
//!     unlock.rs (bounded force-check loop until the lock clears)
//! ```
//!
//! # Design Decisions
//! - Single-writer, multiple-reader: only the poller task mutates state
//! - A failed read retains the previous decision; network loss can never
//!   be used to escape the lock

pub mod poller;
pub mod state;
pub mod unlock;

pub use poller::{LoanMonitor, MonitorHandle};
pub use state::{next_state, LockState, MonitorSnapshot};
pub use unlock::{confirm_unlock, UnlockOutcome, UnlockPolicy};
