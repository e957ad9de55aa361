// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tandem_core::WriterKind;

/// Top-level Tandem configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TandemConfig {
    /// Database location and writer strategy.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log filter settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Which writer strategy serializes writes.
    #[serde(default)]
    pub writer: WriterKind,

    /// Number of read-only connections opened by the pooled writer.
    #[serde(default = "default_max_readers")]
    pub max_readers: usize,

    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Enable WAL (Write-Ahead Logging) mode. Required by the pooled writer.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl StorageConfig {
    /// Config for a database at `path` using the given strategy, other fields defaulted.
    pub fn new(path: impl Into<String>, writer: WriterKind) -> Self {
        Self {
            database_path: path.into(),
            writer,
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// True for SQLite in-memory databases, which cannot be shared between connections.
    pub fn is_in_memory(&self) -> bool {
        let path = self.database_path.trim();
        path == ":memory:" || path.starts_with("file::memory:")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            writer: WriterKind::default(),
            max_readers: default_max_readers(),
            busy_timeout_ms: default_busy_timeout_ms(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tandem").join("tandem.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tandem.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_max_readers() -> usize {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_wal_mode() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default level for tandem crates (trace, debug, info, warn, error).
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl LoggingConfig {
    /// `tracing-subscriber` filter directive: `level` for tandem crates,
    /// `warn` for everything else.
    pub fn filter_directive(&self) -> String {
        format!("tandem={},warn", self.level.trim())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_defaults() {
        let storage = StorageConfig::default();
        assert_eq!(storage.writer, WriterKind::Serial);
        assert_eq!(storage.max_readers, 5);
        assert_eq!(storage.busy_timeout(), Duration::from_secs(5));
        assert!(storage.wal_mode);
        assert!(storage.database_path.ends_with("tandem.db"));
    }

    #[test]
    fn in_memory_detection() {
        assert!(StorageConfig::new(":memory:", WriterKind::Serial).is_in_memory());
        assert!(StorageConfig::new("file::memory:?cache=shared", WriterKind::Serial).is_in_memory());
        assert!(!StorageConfig::new("/tmp/tandem.db", WriterKind::Serial).is_in_memory());
    }

    #[test]
    fn writer_kind_parses_lowercase() {
        let config: TandemConfig = toml::from_str(
            r#"
[storage]
writer = "pooled"
"#,
        )
        .unwrap();
        assert_eq!(config.storage.writer, WriterKind::Pooled);
    }

    #[test]
    fn filter_directive_scopes_level_to_tandem() {
        let logging = LoggingConfig {
            level: " debug ".to_string(),
        };
        assert_eq!(logging.filter_directive(), "tandem=debug,warn");
        assert_eq!(LoggingConfig::default().filter_directive(), "tandem=info,warn");
    }
}
