//! Structured logging initialization.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to this
/// crate only. Call once per process, from the binary.
pub fn init(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("loan_lock={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
