// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write-then-read coordination over SQLite.
//!
//! A write-then-read request runs a write body inside an immediate
//! transaction, then runs a read body on the same connection before the
//! transaction commits, and delivers the combined value to a caller-chosen
//! completion context.
//!
//! Two writer strategies implement [`DatabaseWriter`]:
//!
//! - [`SerialWriter`]: a single `tokio-rusqlite` connection. Reads and
//!   writes share one background thread.
//! - [`PooledWriter`]: one write connection plus a pool of read-only
//!   connections in WAL mode. Reads run concurrently and only observe
//!   committed data.
//!
//! ```no_run
//! # async fn demo() -> Result<(), tandem_core::StoreError> {
//! use tandem_config::StorageConfig;
//! use tandem_core::WriterKind;
//! use tandem_storage::{AnyWriter, DatabaseWriter};
//!
//! let writer = AnyWriter::open(&StorageConfig::new("app.db", WriterKind::Pooled)).await?;
//! let count: i64 = writer
//!     .write_then_read(
//!         |conn| {
//!             conn.execute("INSERT INTO player (name, score) VALUES ('arthur', 1000)", [])?;
//!             Ok(())
//!         },
//!         |conn, ()| Ok(conn.query_row("SELECT COUNT(*) FROM player", [], |row| row.get(0))?),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod database;
pub mod dispatch;
pub mod pool;
pub mod serial;
pub mod single;
pub mod writer;

pub use dispatch::{CompletionContext, ContextClosed, Immediate, RuntimeContext, SerialQueue};
pub use pool::PooledWriter;
pub use serial::SerialWriter;
pub use single::{Delivery, Subscription, SubscriptionState, WriteThenRead};
pub use writer::{AnyWriter, DatabaseWriter};
