// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for Tandem writers.
//!
//! A `tandem.toml` has two sections, `[storage]` and `[logging]`. Files are
//! layered by [`loader::config_files`] and `TANDEM_*` environment variables
//! override them. Parse failures come back as miette diagnostics that point
//! at the offending key; semantic checks live in [`validation`].
//!
//! ```no_run
//! let config = match tandem_config::load_and_validate() {
//!     Ok(config) => config,
//!     Err(errors) => {
//!         eprint!("{}", tandem_config::render_errors(&errors));
//!         std::process::exit(2);
//!     }
//! };
//! println!("writer: {}", config.storage.writer);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{LoggingConfig, StorageConfig, TandemConfig};

use tracing::debug;

/// Load from the file hierarchy and environment, then validate.
pub fn load_and_validate() -> Result<TandemConfig, Vec<ConfigError>> {
    checked(loader::load_config(), read_config_files)
}

/// Load from a TOML string, then validate.
pub fn load_and_validate_str(toml_content: &str) -> Result<TandemConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("tandem.toml".to_string(), toml_content.to_string())]
    })
}

/// Validate a loaded config, or turn the load error into diagnostics.
///
/// `sources` is only consulted on failure.
fn checked(
    loaded: Result<TandemConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<TandemConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    debug!(
        database_path = %config.storage.database_path,
        writer = %config.storage.writer,
        "configuration loaded"
    );
    Ok(config)
}

/// Contents of every config file that exists, keyed by absolute path.
fn read_config_files() -> Vec<(String, String)> {
    let cwd = std::env::current_dir().unwrap_or_default();
    loader::config_files()
        .into_iter()
        .filter_map(|file| {
            let path = cwd.join(file);
            let content = std::fs::read_to_string(&path).ok()?;
            Some((path.display().to_string(), content))
        })
        .collect()
}
