//! Logging infrastructure for Anteroom
//!
//! Structured tracing setup for embedding applications. Telemetry emit
//! failures and swallowed step errors surface here and nowhere else.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with an env-filter fallback derived from the
/// configured log level.
///
/// Honors `RUST_LOG` when set; otherwise filters to
/// `anteroom=<log_level>,info`. Call once per process.
pub fn init(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("anteroom={log_level},info").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
