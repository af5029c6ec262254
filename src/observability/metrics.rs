//! Metric recording helpers.
//!
//! Thin wrappers over the `metrics` facade so call sites stay one line.
//! The embedding application decides whether to install a recorder; without
//! one, every call is a cheap no-op.
//!
//! # Metrics
//! - `loan_lock_polls_total` (counter): status polls by outcome
//! - `loan_lock_state_transitions_total` (counter): lock state changes
//! - `loan_lock_engaged` (gauge): 1 while the decision is locked
//! - `loan_lock_pinning_calls_total` (counter): pinning API calls by op/outcome
//! - `loan_lock_transactions_total` (counter): broadcast writes by kind

use metrics::{counter, gauge};

use crate::monitor::state::LockState;

/// Record one monitor poll by outcome ("success" / "failure").
pub fn record_poll(outcome: &'static str) {
    counter!("loan_lock_polls_total", "outcome" => outcome).increment(1);
}

/// Record a lock state transition.
pub fn record_lock_transition(to: LockState) {
    counter!("loan_lock_state_transitions_total", "to" => to.to_string()).increment(1);
}

/// Record whether the current decision is locked.
pub fn record_lock_engaged(engaged: bool) {
    gauge!("loan_lock_engaged").set(if engaged { 1.0 } else { 0.0 });
}

/// Record one pinning API call.
pub fn record_pinning_call(op: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("loan_lock_pinning_calls_total", "op" => op, "outcome" => outcome).increment(1);
}

/// Record one broadcast transaction by kind.
pub fn record_tx_submitted(kind: &'static str) {
    counter!("loan_lock_transactions_total", "kind" => kind).increment(1);
}
