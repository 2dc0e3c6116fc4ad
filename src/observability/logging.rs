//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target used for misdirection log lines.
pub const MISDIRECTION_TARGET: &str = "minitrue::misdirection";

/// Build the filter: `RUST_LOG` if present, otherwise `level` for this crate.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("minitrue={},hyper=warn", level)))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter(level))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
