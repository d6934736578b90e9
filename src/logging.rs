//! Tracing initialization
//!
//! Sets up the global `tracing` subscriber from `LOG_LEVEL` / `RUST_LOG` and
//! `LOG_FORMAT`. JSON output is intended for deployed environments where logs
//! are shipped to an aggregator; plain output is for local development.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `LOG_LEVEL` (default `info`) is
/// applied to the whole crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(level.to_lowercase())
    });

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if use_json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }
}
