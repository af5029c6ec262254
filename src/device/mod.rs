//! Device enforcement subsystem.
//!
//! # Data Flow
//! ```text
//! monitor publications ──▶ controller.rs ──▶ pinning.rs (platform API)
//! app lifecycle events ──▶ controller.rs (re-assert while locked)
//! ```
//!
//! # Design Decisions
//! - The controller consumes decisions; it never computes them
//! - Pinning failures are logged and counted, never fed back into the
//!   lock decision

pub mod controller;
pub mod pinning;

pub use controller::{AppLifecycleEvent, DeviceLockController};
pub use pinning::{DevicePinning, NoopPinning, PinningError};
