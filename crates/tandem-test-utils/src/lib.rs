// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tandem integration tests.
//!
//! # Components
//!
//! - [`TestDatabase`] - Temp-directory database opened with either writer strategy
//! - [`fixtures`] - The `player` table used by the scenario tests
//! - [`init_tracing`] - Idempotent log subscriber for test binaries

pub mod fixtures;
pub mod harness;

pub use fixtures::Player;
pub use harness::{TestDatabase, TestDatabaseBuilder};

use tandem_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber at `debug` for tandem crates.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    init_tracing_with(&LoggingConfig {
        level: "debug".to_string(),
    });
}

/// Install a `fmt` subscriber filtered by `logging.level`.
///
/// `RUST_LOG` takes precedence when set. Later calls are no-ops.
pub fn init_tracing_with(logging: &LoggingConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(logging))
        .with_target(true)
        .with_test_writer()
        .try_init();
}

fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(logging.filter_directive()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_follows_configured_level_without_rust_log() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let logging = LoggingConfig {
            level: "trace".to_string(),
        };
        let rendered = env_filter(&logging).to_string();
        assert!(rendered.contains("tandem=trace"), "{rendered}");
    }

    #[test]
    fn repeated_initialisation_is_harmless() {
        init_tracing_with(&LoggingConfig::default());
        init_tracing();
    }
}
