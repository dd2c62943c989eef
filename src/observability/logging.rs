//! # Logging
//!
//! Tracing subscriber setup. `RUST_LOG` wins over the configured level;
//! `LOG_FORMAT=text` switches from JSON lines to the human-readable format.

use crate::config::ManagerConfig;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(config: &ManagerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&config.log_level).into());

    let result = if config.log_format.eq_ignore_ascii_case("text") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!("Tracing subscriber already initialized: {}", e);
    }
}

fn default_directive(level: &str) -> String {
    format!("db_role_manager={}", level.to_ascii_lowercase())
}
