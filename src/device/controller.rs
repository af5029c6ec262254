//! Device lock controller.
//!
//! # Responsibilities
//! - Translate published lock decisions into pinning calls
//! - Re-assert the lock on every return to foreground
//! - Keep pinning failures out of the decision path (log and count only)
//!
//! # Design Decisions
//! - Engage order: pin first, then remove the exit gesture
//! - Release order: restore the exit gesture first, then unpin
//! - `Unknown` leaves the device exactly as it is: a monitor that has not
//!   completed a read yet must not unlock anything

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::device::pinning::DevicePinning;
use crate::monitor::state::{LockState, MonitorSnapshot};
use crate::observability::metrics;

/// Application foreground/background transitions, delivered by the
/// embedding platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycleEvent {
    /// App became visible and interactive.
    Foreground,
    /// App left the foreground.
    Background,
}

/// Owns the pinning capability and applies lock decisions to it.
pub struct DeviceLockController {
    pinning: Arc<dyn DevicePinning>,
    /// Last decision applied; drives foreground re-assertion.
    engaged: bool,
}

impl DeviceLockController {
    /// Create a controller over a pinning implementation.
    pub fn new(pinning: Arc<dyn DevicePinning>) -> Self {
        Self {
            pinning,
            engaged: false,
        }
    }

    /// Run the controller task: apply every published snapshot, and re-run
    /// the engage sequence when the app returns to foreground while locked.
    pub fn spawn(
        mut self,
        mut states: watch::Receiver<MonitorSnapshot>,
        mut lifecycle: broadcast::Receiver<AppLifecycleEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            // Apply whatever is already published before waiting for changes.
            let initial = states.borrow_and_update().clone();
            self.apply_state(initial.state);

            loop {
                tokio::select! {
                    changed = states.changed() => {
                        if changed.is_err() {
                            tracing::info!("Monitor dropped; device lock controller exiting");
                            break;
                        }
                        let snapshot = states.borrow_and_update().clone();
                        self.apply_state(snapshot.state);
                    }
                    event = lifecycle.recv() => {
                        match event {
                            Ok(AppLifecycleEvent::Foreground) => self.on_foreground(),
                            Ok(AppLifecycleEvent::Background) => {}
                            // Missed events are fine; the next state
                            // publication reapplies the decision anyway.
                            Err(broadcast::error::RecvError::Lagged(_)) => {}
                            Err(broadcast::error::RecvError::Closed) => {}
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Device lock controller shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Apply one lock decision. Idempotent: reapplying the current decision
    /// repeats the (idempotent) platform calls and nothing else.
    pub fn apply_state(&mut self, state: LockState) {
        match state {
            LockState::Unknown => {
                // No completed read yet; leave the device as it is.
            }
            LockState::OverdueLock | LockState::DefaultedLock => self.engage(),
            LockState::NoLoan | LockState::ActiveOk => self.release(),
        }
    }

    /// Whether the last applied decision was locked.
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    fn on_foreground(&mut self) {
        if self.engaged {
            tracing::info!("App returned to foreground while locked; re-asserting pin");
            self.engage();
        }
    }

    fn engage(&mut self) {
        if let Err(e) = self.pinning.start_pinning() {
            metrics::record_pinning_call("start_pinning", false);
            tracing::error!(error = %e, "Failed to start device pinning");
        } else {
            metrics::record_pinning_call("start_pinning", true);
        }

        if let Err(e) = self.pinning.disable_exit_gesture() {
            metrics::record_pinning_call("disable_exit_gesture", false);
            tracing::error!(error = %e, "Failed to disable exit gesture");
        } else {
            metrics::record_pinning_call("disable_exit_gesture", true);
        }

        if !self.engaged {
            tracing::info!("Device lock engaged");
        }
        self.engaged = true;
    }

    fn release(&mut self) {
        if let Err(e) = self.pinning.enable_exit_gesture() {
            metrics::record_pinning_call("enable_exit_gesture", false);
            tracing::error!(error = %e, "Failed to enable exit gesture");
        } else {
            metrics::record_pinning_call("enable_exit_gesture", true);
        }

        if let Err(e) = self.pinning.stop_pinning() {
            metrics::record_pinning_call("stop_pinning", false);
            tracing::error!(error = %e, "Failed to stop device pinning");
        } else {
            metrics::record_pinning_call("stop_pinning", true);
        }

        if self.engaged {
            tracing::info!("Device lock released");
        }
        self.engaged = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::pinning::PinningError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPinning {
        calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingPinning {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl DevicePinning for RecordingPinning {
        fn start_pinning(&self) -> Result<(), PinningError> {
            self.calls.lock().unwrap().push("start_pinning");
            Ok(())
        }

        fn stop_pinning(&self) -> Result<(), PinningError> {
            self.calls.lock().unwrap().push("stop_pinning");
            Ok(())
        }

        fn disable_exit_gesture(&self) -> Result<(), PinningError> {
            self.calls.lock().unwrap().push("disable_exit_gesture");
            Ok(())
        }

        fn enable_exit_gesture(&self) -> Result<(), PinningError> {
            self.calls.lock().unwrap().push("enable_exit_gesture");
            Ok(())
        }
    }

    #[test]
    fn test_lock_engages_in_order() {
        let pinning = Arc::new(RecordingPinning::default());
        let mut controller = DeviceLockController::new(pinning.clone());

        controller.apply_state(LockState::OverdueLock);
        assert!(controller.is_engaged());
        assert_eq!(pinning.calls(), vec!["start_pinning", "disable_exit_gesture"]);
    }

    #[test]
    fn test_unlock_releases_in_order() {
        let pinning = Arc::new(RecordingPinning::default());
        let mut controller = DeviceLockController::new(pinning.clone());

        controller.apply_state(LockState::DefaultedLock);
        controller.apply_state(LockState::ActiveOk);
        assert!(!controller.is_engaged());
        assert_eq!(
            pinning.calls(),
            vec![
                "start_pinning",
                "disable_exit_gesture",
                "enable_exit_gesture",
                "stop_pinning",
            ]
        );
    }

    #[test]
    fn test_unknown_leaves_device_untouched() {
        let pinning = Arc::new(RecordingPinning::default());
        let mut controller = DeviceLockController::new(pinning.clone());

        controller.apply_state(LockState::Unknown);
        assert!(pinning.calls().is_empty());

        // Once engaged, Unknown must not release either.
        controller.apply_state(LockState::OverdueLock);
        controller.apply_state(LockState::Unknown);
        assert!(controller.is_engaged());
        assert_eq!(pinning.calls(), vec!["start_pinning", "disable_exit_gesture"]);
    }

    #[test]
    fn test_reapplying_lock_is_idempotent_reassertion() {
        let pinning = Arc::new(RecordingPinning::default());
        let mut controller = DeviceLockController::new(pinning.clone());

        controller.apply_state(LockState::OverdueLock);
        controller.apply_state(LockState::OverdueLock);
        // The sequence repeats; the platform API tolerates reapplication.
        assert_eq!(
            pinning.calls(),
            vec![
                "start_pinning",
                "disable_exit_gesture",
                "start_pinning",
                "disable_exit_gesture",
            ]
        );
        assert!(controller.is_engaged());
    }

    #[test]
    fn test_foreground_reasserts_only_while_locked() {
        let pinning = Arc::new(RecordingPinning::default());
        let mut controller = DeviceLockController::new(pinning.clone());

        controller.on_foreground();
        assert!(pinning.calls().is_empty());

        controller.apply_state(LockState::OverdueLock);
        controller.on_foreground();
        assert_eq!(
            pinning.calls(),
            vec![
                "start_pinning",
                "disable_exit_gesture",
                "start_pinning",
                "disable_exit_gesture",
            ]
        );
    }
}
