//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the tracking core.
//! - Apply schema migrations in deterministic order.
//! - Classify storage failures into stable codes for logs and envelopes.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Companies, cadence rules and communications are only touched after
//!   migrations succeed.

use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Storage failure.
///
/// Two SQLite failures matter to callers:
/// - `SQLITE_BUSY`/`SQLITE_LOCKED`: another connection held the write lock
///   for longer than the connection busy timeout. Nothing was written.
/// - `SQLITE_CONSTRAINT`: a row broke a schema rule, typically a
///   communication pointing at a company that does not exist. The enclosing
///   transaction is rolled back.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Whether the write lock could not be acquired within the busy timeout.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.sqlite_code(),
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }

    /// Whether a schema constraint (foreign key, check, unique) rejected a row.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self.sqlite_code(), Some(ErrorCode::ConstraintViolation))
    }

    /// Stable `error_code` value used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedSchemaVersion { .. } => "db_schema_too_new",
            _ if self.is_busy() => "db_busy",
            _ if self.is_constraint_violation() => "db_constraint",
            Self::Sqlite(_) => "db_error",
        }
    }

    fn sqlite_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Sqlite(err) => err.sqlite_error_code(),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) if self.is_busy() => {
                write!(f, "database is busy with another writer: {err}")
            }
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
