// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serial strategy: one connection for reads and writes.
//!
//! Every request, read or write, is queued on the same `tokio-rusqlite`
//! background thread and runs to completion before the next one starts.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Connection, TransactionBehavior};
use tandem_config::StorageConfig;
use tandem_core::{StoreError, WriterKind};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::coordinator;
use crate::database::{self, map_tr_err};
use crate::writer::DatabaseWriter;

/// Writer that serializes all database access on a single connection.
#[derive(Clone)]
pub struct SerialWriter {
    conn: tokio_rusqlite::Connection,
    runtime: Handle,
    path: Arc<str>,
}

impl SerialWriter {
    /// Open the database described by `config`.
    ///
    /// Must be called from within a tokio runtime; that runtime drives
    /// subscriptions made later from outside any runtime.
    pub async fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        database::validate_for(config, WriterKind::Serial)?;
        let runtime = database::current_runtime()?;
        let conn = database::open_write_connection(config).await?;
        info!(path = %config.database_path, "serial writer opened");
        Ok(Self {
            conn,
            runtime,
            path: Arc::from(config.database_path.as_str()),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl DatabaseWriter for SerialWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Serial
    }

    fn runtime(&self) -> &Handle {
        &self.runtime
    }

    async fn write_without_transaction<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.conn.call(body).await.map_err(map_tr_err)
    }

    async fn read<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| -> Result<T, StoreError> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
                let value = coordinator::read_only(&tx, body)?;
                tx.commit()?;
                Ok(value)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| database::checkpoint(conn))
            .await
            .map_err(map_tr_err)?;
        debug!(path = %self.path, "serial writer checkpointed");
        Ok(())
    }
}
