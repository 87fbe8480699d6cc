//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Respect `RUST_LOG` when present, fall back to the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `default_level` is used when `RUST_LOG` is not set, scoped to this
/// crate (dependencies stay at `info`).
pub fn init(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("quota_proxy={default_level},info").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
