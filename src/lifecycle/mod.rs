//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Verify RPC chain id → Spawn monitor,
//!     lock controller → Wait for signal
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Tasks drain and exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Teardown cancels timers and in-flight confirmation loops, never
//!   already-broadcast transactions

pub mod shutdown;

pub use shutdown::Shutdown;
