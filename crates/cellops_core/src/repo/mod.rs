//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repositories reject unmigrated connections at construction time.
//! - Write paths run inside immediate transactions with a bounded retry
//!   budget; an exhausted budget surfaces as `RepoError::Conflict`.
//! - Repository APIs return semantic errors (`ReportNotFound`,
//!   `CellGroupNotFound`) in addition to DB transport errors.

use crate::db::{migrations::latest_version, DbError};
use crate::model::report::ReportValidationError;
use crate::model::{CellGroupId, ReportId};
use chrono::NaiveDate;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod group_repo;
pub mod leave_repo;
pub mod member_repo;
pub mod membership_repo;
pub mod report_repo;

/// Attempts per write before giving up with `Conflict`.
const WRITE_RETRY_BUDGET: u32 = 3;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ReportValidationError),
    Db(DbError),
    ReportNotFound(ReportId),
    CellGroupNotFound(CellGroupId),
    DuplicateReport {
        cell_group_id: CellGroupId,
        meeting_date: NaiveDate,
    },
    Conflict {
        retries: u32,
    },
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::ReportNotFound(id) => write!(f, "meeting report not found: {id}"),
            Self::CellGroupNotFound(id) => write!(f, "cell group not found: {id}"),
            Self::DuplicateReport {
                cell_group_id,
                meeting_date,
            } => write!(
                f,
                "a live report already exists for cell group {cell_group_id} on {meeting_date}"
            ),
            Self::Conflict { retries } => {
                write!(f, "concurrent mutation retry budget exhausted after {retries} attempts")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table: {table}"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column: {table}.{column}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReportValidationError> for RepoError {
    fn from(value: ReportValidationError) -> Self {
        Self::Validation(value)
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

/// Runs `op` inside an immediate transaction, retrying on `SQLITE_BUSY`.
///
/// The transaction is rolled back on error and the whole operation is retried
/// from scratch, so `op` must be safe to re-run.
pub(crate) fn with_immediate_tx<T, F>(conn: &Connection, op: F) -> RepoResult<T>
where
    F: Fn(&Transaction<'_>) -> RepoResult<T>,
{
    for _attempt in 0..WRITE_RETRY_BUDGET {
        let tx = match Transaction::new_unchecked(conn, TransactionBehavior::Immediate) {
            Ok(tx) => tx,
            Err(err) if is_busy(&err) => continue,
            Err(err) => return Err(err.into()),
        };

        match op(&tx) {
            Ok(value) => match tx.commit() {
                Ok(()) => return Ok(value),
                Err(err) if is_busy(&err) => continue,
                Err(err) => return Err(err.into()),
            },
            Err(RepoError::Db(DbError::Sqlite(err))) if is_busy(&err) => continue,
            Err(err) => return Err(err),
        }
    }

    Err(RepoError::Conflict {
        retries: WRITE_RETRY_BUDGET,
    })
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}

/// Rejects connections that were not opened through `db::open_db*`.
pub(crate) fn ensure_schema_version(conn: &Connection) -> RepoResult<()> {
    let expected = latest_version();
    let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual != expected {
        return Err(RepoError::UninitializedConnection {
            expected_version: expected,
            actual_version: actual,
        });
    }
    Ok(())
}

pub(crate) fn ensure_table(conn: &Connection, table: &'static str) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(RepoError::MissingRequiredTable(table))
    }
}

pub(crate) fn ensure_column(
    conn: &Connection,
    table: &'static str,
    column: &'static str,
) -> RepoResult<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(());
        }
    }
    Err(RepoError::MissingRequiredColumn { table, column })
}
