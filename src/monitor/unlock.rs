//! Post-repayment unlock confirmation.
//!
//! A successful payment does not unlock the device by itself: the contract
//! state has to be observed to change, and chain confirmation latency makes
//! that take a few seconds. This loop nudges the monitor and watches its
//! publications until the lock clears or the attempt budget runs out.

use std::time::Duration;

use crate::monitor::poller::MonitorHandle;

/// Bounds for the confirmation loop.
#[derive(Debug, Clone, Copy)]
pub struct UnlockPolicy {
    /// Maximum forced checks before giving up.
    pub max_attempts: u32,
    /// Delay between forced checks.
    pub retry_interval: Duration,
}

impl Default for UnlockPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            retry_interval: Duration::from_secs(1),
        }
    }
}

/// Result of the confirmation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Published state left the locked set.
    Unlocked { attempts: u32 },
    /// Budget exhausted while still locked. The payment itself succeeded;
    /// report "unlock pending", not failure.
    Pending { attempts: u32 },
}

/// Drive forced checks until the published state is verified-unlocked.
///
/// Returns early the moment a publication leaves the locked set (`Unknown`
/// does not count as unlocked). Safe to cancel; it holds no locks.
pub async fn confirm_unlock(handle: &MonitorHandle, policy: UnlockPolicy) -> UnlockOutcome {
    let mut rx = handle.subscribe();

    let current = handle.current();
    if current.state.is_verified() && !current.state.is_locked() {
        return UnlockOutcome::Unlocked { attempts: 0 };
    }

    for attempt in 1..=policy.max_attempts {
        tracing::debug!(attempt = attempt, max = policy.max_attempts, "Unlock confirmation check");
        handle.force_check();

        let deadline = tokio::time::sleep(policy.retry_interval);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        // Monitor is gone; nothing further to observe.
                        return UnlockOutcome::Pending { attempts: attempt };
                    }
                    let snapshot = rx.borrow_and_update().clone();
                    if snapshot.state.is_verified() && !snapshot.state.is_locked() {
                        tracing::info!(attempts = attempt, "Device unlock confirmed");
                        return UnlockOutcome::Unlocked { attempts: attempt };
                    }
                }
            }
        }
    }

    tracing::warn!(
        attempts = policy.max_attempts,
        "Unlock not yet confirmed; payment succeeded, confirmation still pending"
    );
    UnlockOutcome::Pending { attempts: policy.max_attempts }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_budget() {
        let policy = UnlockPolicy::default();
        assert_eq!(policy.max_attempts, 15);
        assert_eq!(policy.retry_interval, Duration::from_secs(1));
    }
}
