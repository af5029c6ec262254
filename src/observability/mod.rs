//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields, one subscriber per process)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Whatever recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - Metric updates are cheap and recorder-optional
//! - Key and wallet material never appears in events

pub mod logging;
pub mod metrics;
