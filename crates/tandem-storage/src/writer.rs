// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The writer capability shared by both database access strategies.
//!
//! Every strategy owns exactly one write serialization point: a single
//! `tokio-rusqlite` connection whose background thread runs write closures
//! one at a time. At most one write transaction is active per writer.
//!
//! **Do NOT open additional connections for writes.**

use async_trait::async_trait;
use rusqlite::{Connection, TransactionBehavior};
use tandem_config::StorageConfig;
use tandem_core::{StoreError, WriterKind};
use tokio::runtime::Handle;

use crate::pool::PooledWriter;
use crate::serial::SerialWriter;
use crate::single::WriteThenRead;

/// A database access strategy that serializes writes.
///
/// Bodies run synchronously on a connection thread; the returned futures
/// resolve once the body has finished and its transaction has ended.
#[async_trait]
pub trait DatabaseWriter: Clone + Send + Sync + 'static {
    fn kind(&self) -> WriterKind;

    /// Runtime used to drive requests submitted from outside any runtime.
    fn runtime(&self) -> &Handle;

    /// Run `body` on the write connection with no transaction opened.
    async fn write_without_transaction<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static;

    /// Run `body` inside an immediate write transaction.
    ///
    /// Commits when `body` returns `Ok`, rolls back otherwise.
    async fn write<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.write_without_transaction(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let value = body(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
    }

    /// Run `body` in a read transaction that rejects mutation.
    ///
    /// A mutating statement fails with `ResultCode::ReadOnly`.
    async fn read<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static;

    /// Checkpoint the WAL. The writer stays usable afterwards.
    async fn close(&self) -> Result<(), StoreError>;

    /// Build a lazy write-then-read request.
    fn write_then_read<T, U, FW, FR>(&self, write_body: FW, read_body: FR) -> WriteThenRead<Self, T, U>
    where
        FW: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        FR: FnOnce(&Connection, T) -> Result<U, StoreError> + Send + 'static,
        T: 'static,
        U: Send + 'static,
    {
        WriteThenRead::new(self.clone(), write_body, read_body)
    }

    /// Build a lazy asynchronous write whose value is delivered like a
    /// write-then-read outcome.
    fn schedule_write<T, F>(&self, body: F) -> WriteThenRead<Self, T, T>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        WriteThenRead::new(self.clone(), body, |_conn, value| Ok(value))
    }
}

/// Writer strategy selected by [`StorageConfig::writer`].
#[derive(Clone)]
pub enum AnyWriter {
    Serial(SerialWriter),
    Pooled(PooledWriter),
}

impl AnyWriter {
    /// Open the strategy named in `config`.
    pub async fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        match config.writer {
            WriterKind::Serial => Ok(Self::Serial(SerialWriter::open(config).await?)),
            WriterKind::Pooled => Ok(Self::Pooled(PooledWriter::open(config).await?)),
        }
    }
}

#[async_trait]
impl DatabaseWriter for AnyWriter {
    fn kind(&self) -> WriterKind {
        match self {
            Self::Serial(writer) => writer.kind(),
            Self::Pooled(writer) => writer.kind(),
        }
    }

    fn runtime(&self) -> &Handle {
        match self {
            Self::Serial(writer) => writer.runtime(),
            Self::Pooled(writer) => writer.runtime(),
        }
    }

    async fn write_without_transaction<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        match self {
            Self::Serial(writer) => writer.write_without_transaction(body).await,
            Self::Pooled(writer) => writer.write_without_transaction(body).await,
        }
    }

    async fn read<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        match self {
            Self::Serial(writer) => writer.read(body).await,
            Self::Pooled(writer) => writer.read(body).await,
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        match self {
            Self::Serial(writer) => writer.close().await,
            Self::Pooled(writer) => writer.close().await,
        }
    }
}
