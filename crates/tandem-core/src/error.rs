// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tandem write-then-read coordinator.

use rusqlite::ErrorCode;
use strum::{Display, EnumString};
use thiserror::Error;

/// The primary error type used across writers, the coordinator and delivery.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error reported by the SQLite engine, classified by result code.
    #[error("sqlite error ({code}): {message}")]
    Sqlite {
        code: ResultCode,
        extended_code: Option<i32>,
        message: String,
        source: Option<rusqlite::Error>,
    },

    /// An error raised by a caller-supplied write or read body.
    #[error("{message}")]
    Application {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The connection thread has shut down and cannot accept more work.
    #[error("database connection closed")]
    ConnectionClosed,

    /// The completion context refused or discarded the outcome.
    #[error("completion context dropped the outcome before delivery")]
    DeliveryDropped,

    /// Invalid storage configuration detected while opening a writer.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Build an application error from a message.
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an arbitrary error raised inside a body.
    pub fn from_source(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Application {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Engine result-code classification of this error.
    ///
    /// Errors that never reached the engine map onto the closest primary
    /// code so callers can branch on a single value.
    pub fn code(&self) -> ResultCode {
        match self {
            Self::Sqlite { code, .. } => *code,
            Self::Application { .. } => ResultCode::Error,
            Self::ConnectionClosed | Self::Config(_) => ResultCode::Misuse,
            Self::DeliveryDropped => ResultCode::Abort,
            Self::Internal(_) => ResultCode::Internal,
        }
    }

    /// True when the engine rejected a mutation on a read-only connection
    /// or during a read-only phase.
    pub fn is_read_only_violation(&self) -> bool {
        self.code() == ResultCode::ReadOnly
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let (code, extended_code) = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => {
                (ResultCode::from(failure.code), Some(failure.extended_code))
            }
            _ => (ResultCode::Error, None),
        };
        Self::Sqlite {
            code,
            extended_code,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// SQLite primary result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum ResultCode {
    #[strum(serialize = "SQLITE_ERROR")]
    Error,
    #[strum(serialize = "SQLITE_INTERNAL")]
    Internal,
    #[strum(serialize = "SQLITE_PERM")]
    Permission,
    #[strum(serialize = "SQLITE_ABORT")]
    Abort,
    #[strum(serialize = "SQLITE_BUSY")]
    Busy,
    #[strum(serialize = "SQLITE_LOCKED")]
    Locked,
    #[strum(serialize = "SQLITE_NOMEM")]
    NoMemory,
    #[strum(serialize = "SQLITE_READONLY")]
    ReadOnly,
    #[strum(serialize = "SQLITE_INTERRUPT")]
    Interrupt,
    #[strum(serialize = "SQLITE_IOERR")]
    IoError,
    #[strum(serialize = "SQLITE_CORRUPT")]
    Corrupt,
    #[strum(serialize = "SQLITE_NOTFOUND")]
    NotFound,
    #[strum(serialize = "SQLITE_FULL")]
    Full,
    #[strum(serialize = "SQLITE_CANTOPEN")]
    CantOpen,
    #[strum(serialize = "SQLITE_PROTOCOL")]
    Protocol,
    #[strum(serialize = "SQLITE_SCHEMA")]
    Schema,
    #[strum(serialize = "SQLITE_TOOBIG")]
    TooBig,
    #[strum(serialize = "SQLITE_CONSTRAINT")]
    Constraint,
    #[strum(serialize = "SQLITE_MISMATCH")]
    Mismatch,
    #[strum(serialize = "SQLITE_MISUSE")]
    Misuse,
    #[strum(serialize = "SQLITE_NOLFS")]
    NoLargeFile,
    #[strum(serialize = "SQLITE_AUTH")]
    Auth,
    #[strum(serialize = "SQLITE_RANGE")]
    Range,
    #[strum(serialize = "SQLITE_NOTADB")]
    NotADatabase,
    #[strum(serialize = "SQLITE_UNKNOWN")]
    Unknown,
}

impl From<ErrorCode> for ResultCode {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::InternalMalfunction => Self::Internal,
            ErrorCode::PermissionDenied => Self::Permission,
            ErrorCode::OperationAborted => Self::Abort,
            ErrorCode::DatabaseBusy => Self::Busy,
            ErrorCode::DatabaseLocked => Self::Locked,
            ErrorCode::OutOfMemory => Self::NoMemory,
            ErrorCode::ReadOnly => Self::ReadOnly,
            ErrorCode::OperationInterrupted => Self::Interrupt,
            ErrorCode::SystemIoFailure => Self::IoError,
            ErrorCode::DatabaseCorrupt => Self::Corrupt,
            ErrorCode::NotFound => Self::NotFound,
            ErrorCode::DiskFull => Self::Full,
            ErrorCode::CannotOpen => Self::CantOpen,
            ErrorCode::FileLockingProtocolFailed => Self::Protocol,
            ErrorCode::SchemaChanged => Self::Schema,
            ErrorCode::TooBig => Self::TooBig,
            ErrorCode::ConstraintViolation => Self::Constraint,
            ErrorCode::TypeMismatch => Self::Mismatch,
            ErrorCode::ApiMisuse => Self::Misuse,
            ErrorCode::NoLargeFileSupport => Self::NoLargeFile,
            ErrorCode::AuthorizationForStatementDenied => Self::Auth,
            ErrorCode::ParameterOutOfRange => Self::Range,
            ErrorCode::NotADatabase => Self::NotADatabase,
            // ErrorCode is non_exhaustive.
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readonly_failure() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY),
            Some("attempt to write a readonly database".into()),
        )
    }

    #[test]
    fn sqlite_failure_keeps_engine_classification() {
        let err = StoreError::from(readonly_failure());
        assert_eq!(err.code(), ResultCode::ReadOnly);
        assert!(err.is_read_only_violation());
        match &err {
            StoreError::Sqlite {
                extended_code,
                message,
                ..
            } => {
                assert_eq!(*extended_code, Some(rusqlite::ffi::SQLITE_READONLY));
                assert!(message.contains("readonly"), "got: {message}");
            }
            other => panic!("expected Sqlite variant, got {other:?}"),
        }
    }

    #[test]
    fn non_engine_rusqlite_errors_are_generic() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.code(), ResultCode::Error);
        assert!(!err.is_read_only_violation());
    }

    #[test]
    fn application_errors_keep_their_message() {
        let err = StoreError::application("score must be positive");
        assert_eq!(err.to_string(), "score must be positive");
        assert_eq!(err.code(), ResultCode::Error);

        let io = StoreError::from_source(std::io::Error::other("disk gone"));
        assert_eq!(io.to_string(), "disk gone");
        assert!(std::error::Error::source(&io).is_some());
    }

    #[test]
    fn result_code_renders_sqlite_names() {
        assert_eq!(ResultCode::ReadOnly.to_string(), "SQLITE_READONLY");
        assert_eq!(ResultCode::from(ErrorCode::ConstraintViolation), ResultCode::Constraint);
        assert_eq!(
            "SQLITE_BUSY".parse::<ResultCode>().expect("should parse"),
            ResultCode::Busy
        );
    }
}
