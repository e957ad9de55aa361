// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `player` table and helpers shared by scenario tests.

use rusqlite::{Connection, params};
use tandem_core::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub score: i64,
}

pub fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS player (
            id    INTEGER PRIMARY KEY AUTOINCREMENT,
            name  TEXT NOT NULL,
            score INTEGER NOT NULL DEFAULT 0
        );",
    )?;
    Ok(())
}

/// Insert a player and return its row id.
pub fn insert_player(conn: &Connection, name: &str, score: i64) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO player (name, score) VALUES (?1, ?2)",
        params![name, score],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn player_count(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM player", [], |row| row.get(0))?)
}

pub fn fetch_player(conn: &Connection, id: i64) -> Result<Option<Player>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, name, score FROM player WHERE id = ?1")?;
    let mut rows = stmt.query_map([id], |row| {
        Ok(Player {
            id: row.get(0)?,
            name: row.get(1)?,
            score: row.get(2)?,
        })
    })?;
    Ok(rows.next().transpose()?)
}
