// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pooled strategy: one write connection plus a pool of read-only connections.
//!
//! Writes are serialized on the write connection exactly as in the serial
//! strategy. Reads check out one of `max_readers` read-only connections and
//! run concurrently with each other and with the writer. WAL mode lets each
//! reader see the last committed snapshot while a write is in progress.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::{Connection, TransactionBehavior};
use tandem_config::StorageConfig;
use tandem_core::{StoreError, WriterKind};
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info};

use crate::coordinator;
use crate::database::{self, map_tr_err};
use crate::writer::DatabaseWriter;

/// Writer with a dedicated write connection and concurrent readers.
#[derive(Clone)]
pub struct PooledWriter {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    writer: tokio_rusqlite::Connection,
    readers: ReaderPool,
    runtime: Handle,
    path: String,
}

impl PooledWriter {
    /// Open the database described by `config` with `max_readers` readers.
    ///
    /// Requires a file-backed database in WAL mode.
    pub async fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        database::validate_for(config, WriterKind::Pooled)?;
        let runtime = database::current_runtime()?;
        let writer = database::open_write_connection(config).await?;

        let mut connections = Vec::with_capacity(config.max_readers);
        for _ in 0..config.max_readers {
            connections.push(database::open_read_connection(config).await?);
        }

        info!(
            path = %config.database_path,
            readers = config.max_readers,
            "pooled writer opened"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                writer,
                readers: ReaderPool::new(connections),
                runtime,
                path: config.database_path.clone(),
            }),
        })
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Total number of read-only connections.
    pub fn reader_count(&self) -> usize {
        self.inner.readers.connections.len()
    }

    /// Number of read-only connections not checked out right now.
    pub fn idle_readers(&self) -> usize {
        self.inner.readers.idle_count()
    }
}

#[async_trait]
impl DatabaseWriter for PooledWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Pooled
    }

    fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    async fn write_without_transaction<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.writer.call(body).await.map_err(map_tr_err)
    }

    async fn read<T, F>(&self, body: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let lease = self.inner.readers.checkout().await?;
        lease
            .connection()
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
        self.inner
            .writer
            .call(|conn| database::checkpoint(conn))
            .await
            .map_err(map_tr_err)?;
        debug!(path = %self.inner.path, "pooled writer checkpointed");
        Ok(())
    }
}

/// Fixed set of read-only connections handed out one request at a time.
struct ReaderPool {
    connections: Vec<tokio_rusqlite::Connection>,
    idle: Mutex<Vec<usize>>,
    permits: Semaphore,
}

impl ReaderPool {
    fn new(connections: Vec<tokio_rusqlite::Connection>) -> Self {
        let idle = (0..connections.len()).rev().collect();
        let permits = Semaphore::new(connections.len());
        Self {
            connections,
            idle: Mutex::new(idle),
            permits,
        }
    }

    /// Wait for an idle reader and lease it.
    async fn checkout(&self) -> Result<ReaderLease<'_>, StoreError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| StoreError::ConnectionClosed)?;
        let index = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or_else(|| StoreError::Internal("reader permit granted with no idle reader".into()))?;
        Ok(ReaderLease {
            pool: self,
            index,
            _permit: permit,
        })
    }

    fn idle_count(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A checked-out reader. Returns itself to the pool on drop.
struct ReaderLease<'a> {
    pool: &'a ReaderPool,
    index: usize,
    _permit: SemaphorePermit<'a>,
}

impl ReaderLease<'_> {
    fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.pool.connections[self.index]
    }
}

impl Drop for ReaderLease<'_> {
    fn drop(&mut self) {
        // Index goes back before the permit is released.
        self.pool
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.index);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    use super::*;
    use tandem_core::ResultCode;
    use tempfile::tempdir;

    async fn pooled(dir: &tempfile::TempDir, readers: usize) -> PooledWriter {
        let path = dir.path().join("pool.db");
        let mut config = StorageConfig::new(path.to_string_lossy(), WriterKind::Pooled);
        config.max_readers = readers;
        let writer = PooledWriter::open(&config).await.unwrap();
        writer
            .write(|conn| {
                conn.execute_batch("CREATE TABLE event (id INTEGER PRIMARY KEY, kind TEXT NOT NULL);")?;
                Ok(())
            })
            .await
            .unwrap();
        writer
    }

    async fn wait_for_idle(writer: &PooledWriter, expected: usize) {
        for _ in 0..200 {
            if writer.idle_readers() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("idle readers never reached {expected}");
    }

    #[tokio::test]
    async fn open_creates_configured_readers() {
        let dir = tempdir().unwrap();
        let writer = pooled(&dir, 3).await;
        assert_eq!(writer.kind(), WriterKind::Pooled);
        assert_eq!(writer.reader_count(), 3);
        assert_eq!(writer.idle_readers(), 3);
    }

    #[tokio::test]
    async fn open_rejects_in_memory_database() {
        let result = PooledWriter::open(&StorageConfig::new(":memory:", WriterKind::Pooled)).await;
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn read_rejects_mutation() {
        let dir = tempdir().unwrap();
        let writer = pooled(&dir, 2).await;
        let err = writer
            .read(|conn| {
                conn.execute("INSERT INTO event (kind) VALUES ('x')", [])?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::ReadOnly);
        assert_eq!(writer.idle_readers(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reader_is_leased_while_read_runs() {
        let dir = tempdir().unwrap();
        let writer = pooled(&dir, 2).await;
        let (release_tx, release_rx) = std_mpsc::channel::<()>();

        let busy = writer.clone();
        let parked = tokio::spawn(async move {
            busy.read(move |_conn| {
                release_rx
                    .recv_timeout(Duration::from_secs(5))
                    .map_err(StoreError::from_source)
            })
            .await
        });

        wait_for_idle(&writer, 1).await;

        // The other reader is still free.
        let count: i64 = writer
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM event", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);

        release_tx.send(()).unwrap();
        parked.await.unwrap().unwrap();
        assert_eq!(writer.idle_readers(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reads_see_last_commit_while_write_is_open() {
        let dir = tempdir().unwrap();
        let writer = pooled(&dir, 1).await;
        let (inserted_tx, inserted_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = std_mpsc::channel::<()>();

        let busy = writer.clone();
        let write = tokio::spawn(async move {
            busy.write(move |conn| {
                conn.execute("INSERT INTO event (kind) VALUES ('pending')", [])?;
                let _ = inserted_tx.send(());
                release_rx
                    .recv_timeout(Duration::from_secs(5))
                    .map_err(StoreError::from_source)
            })
            .await
        });

        inserted_rx.await.unwrap();
        let during: i64 = writer
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM event", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(during, 0);

        release_tx.send(()).unwrap();
        write.await.unwrap().unwrap();

        let after: i64 = writer
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM event", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(after, 1);
    }
}
