// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-directory databases for exercising both writer strategies.

use tandem_config::StorageConfig;
use tandem_core::{StoreError, WriterKind};
use tandem_storage::{AnyWriter, DatabaseWriter};
use tempfile::TempDir;

use crate::fixtures;

/// Builder for [`TestDatabase`].
pub struct TestDatabaseBuilder {
    kind: WriterKind,
    max_readers: usize,
}

impl TestDatabaseBuilder {
    fn new(kind: WriterKind) -> Self {
        Self {
            kind,
            max_readers: 4,
        }
    }

    /// Number of readers for the pooled strategy. Ignored by the serial one.
    pub fn with_readers(mut self, max_readers: usize) -> Self {
        self.max_readers = max_readers;
        self
    }

    /// Create the temp directory and open the writer.
    pub async fn build(self) -> Result<TestDatabase, StoreError> {
        let dir = TempDir::new().map_err(StoreError::from_source)?;
        let path = dir.path().join("test.db");

        let mut config = StorageConfig::new(path.to_string_lossy(), self.kind);
        config.max_readers = self.max_readers;

        let writer = AnyWriter::open(&config).await?;
        writer.write(fixtures::create_schema).await?;

        Ok(TestDatabase { writer, _dir: dir })
    }
}

/// A writer over a database file that is deleted when this value drops.
pub struct TestDatabase {
    pub writer: AnyWriter,
    _dir: TempDir,
}

impl TestDatabase {
    pub fn builder(kind: WriterKind) -> TestDatabaseBuilder {
        TestDatabaseBuilder::new(kind)
    }

    /// Open a database with the `player` table using default settings.
    pub async fn open(kind: WriterKind) -> Result<Self, StoreError> {
        Self::builder(kind).build().await
    }

    /// Number of rows in the `player` table.
    pub async fn player_count(&self) -> Result<i64, StoreError> {
        self.writer.read(fixtures::player_count).await
    }
}
