//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for companies, cadence
//!   rules and communications.
//! - Isolate SQLite query details from service and engine code.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Multi-row writes are atomic: all rows land or none do.
//! - Multi-query reads that must agree with each other run inside one
//!   `ReadSnapshot::read_snapshot` scope.

pub mod cadence_repo;
pub mod communication_repo;
pub mod company_repo;

use crate::db::DbError;
use crate::model::cadence::CadenceValidationError;
use crate::model::company::{CompanyId, CompanyValidationError};
use chrono::NaiveDate;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence error shared by all repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    CompanyNotFound(CompanyId),
    /// No cadence rule in any scope uses this method.
    UnknownMethod(String),
    InvalidCompany(CompanyValidationError),
    InvalidCadence(CadenceValidationError),
    /// Persisted row cannot be converted into a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::CompanyNotFound(id) => write!(f, "company not found: {id}"),
            Self::UnknownMethod(method) => write!(f, "unknown communication method `{method}`"),
            Self::InvalidCompany(err) => write!(f, "{err}"),
            Self::InvalidCadence(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidCompany(err) => Some(err),
            Self::InvalidCadence(err) => Some(err),
            Self::CompanyNotFound(_) | Self::UnknownMethod(_) | Self::InvalidData(_) => None,
        }
    }
}

impl RepoError {
    /// Stable `error_code` value used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(err) => err.code(),
            Self::CompanyNotFound(_) => "company_not_found",
            Self::UnknownMethod(_) => "unknown_method",
            Self::InvalidCompany(_) | Self::InvalidCadence(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_persisted_data",
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<CompanyValidationError> for RepoError {
    fn from(value: CompanyValidationError) -> Self {
        Self::InvalidCompany(value)
    }
}

impl From<CadenceValidationError> for RepoError {
    fn from(value: CadenceValidationError) -> Self {
        Self::InvalidCadence(value)
    }
}

/// Scope for reads that must observe one committed state.
///
/// Repositories handed to one service share a connection, so a snapshot
/// opened through any of them covers the reads of all of them.
pub trait ReadSnapshot {
    /// Runs `read` so that every query inside it sees the same committed
    /// state. A batch committed by another connection is seen whole or not
    /// at all.
    fn read_snapshot<T>(&self, read: impl FnOnce() -> RepoResult<T>) -> RepoResult<T>;
}

/// Runs `read` inside one DEFERRED transaction on `conn`.
///
/// Joins the enclosing transaction when `conn` is already inside one.
pub(crate) fn read_in_transaction<T>(
    conn: &Connection,
    read: impl FnOnce() -> RepoResult<T>,
) -> RepoResult<T> {
    if !conn.is_autocommit() {
        return read();
    }
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
    let value = read()?;
    tx.commit()?;
    Ok(value)
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_date(value: &str, column: &str) -> RepoResult<NaiveDate> {
    value
        .parse::<NaiveDate>()
        .map_err(|_| RepoError::InvalidData(format!("invalid date value `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
