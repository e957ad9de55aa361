// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tandem.toml` > `~/.config/tandem/tandem.toml` > `/etc/tandem/tandem.toml`
//! with environment variable overrides via `TANDEM_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::TandemConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tandem/tandem.toml` (system-wide)
/// 3. `~/.config/tandem/tandem.toml` (user XDG config)
/// 4. `./tandem.toml` (local directory)
/// 5. `TANDEM_*` environment variables
pub fn load_config() -> Result<TandemConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
pub fn load_config_from_str(toml_content: &str) -> Result<TandemConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TandemConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TandemConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TandemConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files in merge order, lowest precedence first.
pub fn config_files() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from("/etc/tandem/tandem.toml")];
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join("tandem").join("tandem.toml"));
    }
    files.push(PathBuf::from("tandem.toml"));
    files
}

/// Defaults, every file from [`config_files`], then `TANDEM_*` variables.
pub fn build_figment() -> Figment {
    config_files()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(TandemConfig::default())),
            |figment, file| figment.merge(Toml::file(file)),
        )
        .merge(env_provider())
}

/// `TANDEM_*` environment provider.
///
/// figment hands `map` the key in its original case with the prefix
/// stripped, so it is lowercased before the section is split off:
/// `TANDEM_STORAGE_MAX_READERS` becomes `storage.max_readers`.
fn env_provider() -> Env {
    Env::prefixed("TANDEM_").map(|key| env_key_to_path(key.as_str()).into())
}

fn env_key_to_path(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    ["storage", "logging"]
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|field| format!("{section}.{field}"))
        })
        .unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::WriterKind;

    #[test]
    fn env_keys_map_to_sections_regardless_of_case() {
        assert_eq!(env_key_to_path("STORAGE_MAX_READERS"), "storage.max_readers");
        assert_eq!(env_key_to_path("storage_wal_mode"), "storage.wal_mode");
        assert_eq!(env_key_to_path("LOGGING_LEVEL"), "logging.level");
        assert_eq!(env_key_to_path("STORAGEX"), "storagex");
    }

    #[test]
    fn env_vars_override_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "tandem.toml",
                r#"
[storage]
database_path = "/tmp/file.db"
max_readers = 2
"#,
            )?;
            jail.set_env("TANDEM_STORAGE_MAX_READERS", "8");
            jail.set_env("TANDEM_STORAGE_WRITER", "pooled");

            let config = load_config_from_path(Path::new("tandem.toml"))?;
            assert_eq!(config.storage.database_path, "/tmp/file.db");
            assert_eq!(config.storage.max_readers, 8);
            assert_eq!(config.storage.writer, WriterKind::Pooled);
            Ok(())
        });
    }

    #[test]
    fn logging_level_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TANDEM_LOGGING_LEVEL", "trace");
            let config = load_config()?;
            assert_eq!(config.logging.level, "trace");
            Ok(())
        });
    }
}
