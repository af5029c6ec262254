//! OS device-pinning capability.
//!
//! The platform API (Android screen pinning) restricts the device to this
//! app and removes the unpin gesture. On platforms without the capability,
//! [`NoopPinning`] stands in so the rest of the subsystem is unchanged.

use thiserror::Error;

/// Pinning call failures. Logged and counted by the controller, never
/// allowed to alter the lock decision.
#[derive(Debug, Error)]
pub enum PinningError {
    /// The capability does not exist on this platform or build.
    #[error("device pinning unavailable: {0}")]
    Unavailable(String),

    /// The platform call itself failed.
    #[error("pinning call failed: {0}")]
    Platform(String),
}

/// The platform pinning surface.
///
/// Implementations must be idempotent: the controller re-asserts the active
/// decision (notably on every return to foreground), so repeating a call
/// must neither error nor produce visible UI churn.
pub trait DevicePinning: Send + Sync {
    /// Pin the app to the foreground.
    fn start_pinning(&self) -> Result<(), PinningError>;

    /// Release the pin.
    fn stop_pinning(&self) -> Result<(), PinningError>;

    /// Remove the OS unpin gesture while pinned.
    fn disable_exit_gesture(&self) -> Result<(), PinningError>;

    /// Restore the OS unpin gesture.
    fn enable_exit_gesture(&self) -> Result<(), PinningError>;
}

/// Stand-in for platforms without a pinning API. Every call succeeds and
/// logs at debug so enforcement decisions remain observable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPinning;

impl DevicePinning for NoopPinning {
    fn start_pinning(&self) -> Result<(), PinningError> {
        tracing::debug!("start_pinning (no-op)");
        Ok(())
    }

    fn stop_pinning(&self) -> Result<(), PinningError> {
        tracing::debug!("stop_pinning (no-op)");
        Ok(())
    }

    fn disable_exit_gesture(&self) -> Result<(), PinningError> {
        tracing::debug!("disable_exit_gesture (no-op)");
        Ok(())
    }

    fn enable_exit_gesture(&self) -> Result<(), PinningError> {
        tracing::debug!("enable_exit_gesture (no-op)");
        Ok(())
    }
}
