// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection opening with PRAGMA setup, WAL mode, and error mapping.
//!
//! Write connections own the journal mode. Read connections are opened with
//! `SQLITE_OPEN_READ_ONLY` and only get a busy timeout, since a read-only
//! handle cannot change the journal mode.

use std::path::Path;
use std::time::Duration;

use rusqlite::OpenFlags;
use tandem_config::validation::validate_storage;
use tandem_config::StorageConfig;
use tandem_core::{StoreError, WriterKind};
use tokio::runtime::Handle;
use tokio_rusqlite::Connection;
use tracing::debug;

/// Convert a `tokio_rusqlite` error into a [`StoreError`].
///
/// Errors produced inside a connection closure pass through unchanged.
#[allow(unreachable_patterns)]
pub fn map_tr_err<E: Into<StoreError>>(err: tokio_rusqlite::Error<E>) -> StoreError {
    match err {
        tokio_rusqlite::Error::ConnectionClosed => StoreError::ConnectionClosed,
        tokio_rusqlite::Error::Close((_, e)) => StoreError::from(e),
        tokio_rusqlite::Error::Error(e) => e.into(),
        _ => StoreError::Internal("unrecognized tokio-rusqlite error".into()),
    }
}

/// Validate `config` as if it selected the `kind` strategy.
pub(crate) fn validate_for(config: &StorageConfig, kind: WriterKind) -> Result<(), StoreError> {
    let mut effective = config.clone();
    effective.writer = kind;
    validate_storage(&effective).map_err(|errors| {
        StoreError::Config(
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    })
}

/// The tokio runtime driving the caller, required by writers at open time.
pub(crate) fn current_runtime() -> Result<Handle, StoreError> {
    Handle::try_current()
        .map_err(|err| StoreError::Internal(format!("writers must be opened inside a tokio runtime: {err}")))
}

/// Open the connection that serializes all writes.
pub async fn open_write_connection(config: &StorageConfig) -> Result<Connection, StoreError> {
    let conn = if config.is_in_memory() {
        Connection::open_in_memory().await.map_err(StoreError::from)?
    } else {
        ensure_parent_dir(&config.database_path)?;
        Connection::open(config.database_path.clone())
            .await
            .map_err(StoreError::from)?
    };

    let busy_timeout = config.busy_timeout();
    let wal_mode = config.wal_mode;
    conn.call(move |conn| configure_write_connection(conn, busy_timeout, wal_mode))
        .await
        .map_err(map_tr_err)?;

    debug!(path = %config.database_path, wal_mode, "write connection opened");
    Ok(conn)
}

/// Open a connection that the engine refuses to write through.
pub async fn open_read_connection(config: &StorageConfig) -> Result<Connection, StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(config.database_path.clone(), flags)
        .await
        .map_err(StoreError::from)?;

    let busy_timeout = config.busy_timeout();
    conn.call(move |conn| -> Result<(), StoreError> {
        conn.busy_timeout(busy_timeout)?;
        Ok(())
    })
    .await
    .map_err(map_tr_err)?;

    Ok(conn)
}

/// Apply PRAGMAs to a write connection.
pub fn configure_write_connection(
    conn: &rusqlite::Connection,
    busy_timeout: Duration,
    wal_mode: bool,
) -> Result<(), StoreError> {
    conn.busy_timeout(busy_timeout)?;
    if wal_mode {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }
    conn.execute_batch(
        "PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )?;
    Ok(())
}

/// Checkpoint and truncate the WAL file.
pub fn checkpoint(conn: &rusqlite::Connection) -> Result<(), StoreError> {
    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
    Ok(())
}

fn ensure_parent_dir(path: &str) -> Result<(), StoreError> {
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
        && !path.starts_with("file:")
    {
        std::fs::create_dir_all(parent).map_err(StoreError::from_source)?;
    }
    Ok(())
}
