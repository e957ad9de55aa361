// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as a pooled writer pointing at an in-memory database.

use tandem_core::WriterKind;

use crate::diagnostic::ConfigError;
use crate::model::{StorageConfig, TandemConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TandemConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = storage_errors(&config.storage);

    if !LOG_LEVELS.contains(&config.logging.level.trim()) {
        errors.push(ConfigError::validation(
            "logging.level",
            format!(
                "`{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate only the storage section.
///
/// Writers call this on open so that a hand-built `StorageConfig` gets the
/// same checks as one loaded from disk.
pub fn validate_storage(storage: &StorageConfig) -> Result<(), Vec<ConfigError>> {
    let errors = storage_errors(storage);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn storage_errors(storage: &StorageConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path",
            "must not be empty",
        ));
    }

    if storage.writer == WriterKind::Pooled {
        if storage.max_readers < 1 {
            errors.push(ConfigError::validation(
                "storage.max_readers",
                "the pooled writer needs at least one reader",
            ));
        }

        if storage.is_in_memory() {
            errors.push(ConfigError::validation(
                "storage.database_path",
                format!(
                    "the pooled writer needs a database file, got `{}`",
                    storage.database_path
                ),
            ));
        }

        if !storage.wal_mode {
            errors.push(ConfigError::validation(
                "storage.wal_mode",
                "must be true for the pooled writer",
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = TandemConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = TandemConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { key, .. } if key == "storage.database_path")));
    }

    #[test]
    fn pooled_writer_rejects_memory_database_and_disabled_wal() {
        let mut config = TandemConfig::default();
        config.storage.writer = WriterKind::Pooled;
        config.storage.database_path = ":memory:".to_string();
        config.storage.wal_mode = false;
        config.storage.max_readers = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3, "all storage errors are collected: {errors:?}");
    }

    #[test]
    fn serial_writer_accepts_memory_database() {
        let storage = StorageConfig::new(":memory:", WriterKind::Serial);
        assert!(validate_storage(&storage).is_ok());
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = TandemConfig::default();
        config.logging.level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { key, .. } if key == "logging.level")));
    }
}
