// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transaction continuation: a write followed by a read inside one transaction.
//!
//! Runs synchronously on the connection thread of the writer strategy. The
//! read body sees the write's uncommitted effects and nothing else, because
//! the write transaction is `IMMEDIATE` and is still open while it runs.
//! `PRAGMA query_only` is switched on for the read body so that any mutation
//! it attempts fails with `SQLITE_READONLY` and takes the write down with it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
use rusqlite::{Connection, TransactionBehavior};
use tandem_core::{Outcome, ResultCode, StoreError};
use tracing::{debug, warn};

/// Run `write_body` then `read_body` in one transaction on `conn`.
///
/// Commits only if both bodies succeed. Any error rolls the whole
/// transaction back and is returned unchanged.
pub fn write_then_read<T, U, W, R>(conn: &mut Connection, write_body: W, read_body: R) -> Outcome<U>
where
    W: FnOnce(&Connection) -> Result<T, StoreError>,
    R: FnOnce(&Connection, T) -> Result<U, StoreError>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let result = write_body(&tx).and_then(|value| read_only(&tx, |conn| read_body(conn, value)));

    match result {
        Ok(value) => {
            tx.commit()?;
            debug!("write-then-read committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!(error = %rollback_err, "rollback of failed write-then-read failed");
            }
            debug!(code = %err.code(), error = %err, "write-then-read rolled back");
            Err(err)
        }
    }
}

/// Run `body` with `PRAGMA query_only` enabled on `conn`.
///
/// While `body` runs, an authorizer rejects statements that could end or
/// split the enclosing transaction (`COMMIT`, `ROLLBACK`, savepoints) or
/// change a pragma such as `query_only` itself. Rejections surface as
/// `ResultCode::ReadOnly`. The pragma and authorizer are reset whether or
/// not `body` succeeds. A body error takes precedence over a failure to reset.
pub fn read_only<T, F>(conn: &Connection, body: F) -> Result<T, StoreError>
where
    F: FnOnce(&Connection) -> Result<T, StoreError>,
{
    let in_transaction = !conn.is_autocommit();
    conn.execute_batch("PRAGMA query_only = 1;")?;

    let denied = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&denied);
    conn.authorizer(Some(move |ctx: AuthContext<'_>| {
        if escapes_read_phase(&ctx.action) {
            flag.store(true, Ordering::Relaxed);
            Authorization::Deny
        } else {
            Authorization::Allow
        }
    }));

    let mut result = body(conn);
    conn.authorizer(None::<fn(AuthContext<'_>) -> Authorization>);

    if denied.load(Ordering::Relaxed) {
        result = result.map_err(into_read_only_violation);
    }
    if result.is_ok() && in_transaction && conn.is_autocommit() {
        result = Err(StoreError::Internal(
            "read body ended the enclosing transaction".into(),
        ));
    }

    let reset = conn.execute_batch("PRAGMA query_only = 0;");

    match (result, reset) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(reset_err)) => Err(reset_err.into()),
        (Err(err), reset) => {
            if let Err(reset_err) = reset {
                warn!(error = %reset_err, "failed to leave query_only mode");
            }
            Err(err)
        }
    }
}

fn escapes_read_phase(action: &AuthAction<'_>) -> bool {
    match action {
        AuthAction::Transaction { .. } | AuthAction::Savepoint { .. } => true,
        AuthAction::Pragma { pragma_value, .. } => pragma_value.is_some(),
        _ => false,
    }
}

fn into_read_only_violation(err: StoreError) -> StoreError {
    match err {
        StoreError::Sqlite {
            code: ResultCode::Auth,
            message,
            source,
            ..
        } => StoreError::Sqlite {
            code: ResultCode::ReadOnly,
            extended_code: None,
            message: format!("statement not allowed while reading: {message}"),
            source,
        },
        other => other,
    }
}
