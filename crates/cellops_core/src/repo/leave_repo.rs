//! Leave registry adapter and SQLite implementation.
//!
//! # Responsibility
//! - Record leaves of absence and answer "who is excused" interval queries.
//!
//! # Invariants
//! - Reconciliation consumes `LeaveSource` read-only; it never mutates leaves.
//! - Interval overlap is inclusive on both ends.

use crate::model::member::Leave;
use crate::model::MemberId;
use crate::repo::{ensure_schema_version, ensure_table, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::collections::BTreeSet;

/// Narrow read-only adapter: members excused inside `[from, until]`.
///
/// Reconciliation treats adapter failure as "no one excused"; implementations
/// should still return real errors so the caller can log the degradation.
pub trait LeaveSource {
    fn list_leaves(&self, from: NaiveDate, until: NaiveDate) -> RepoResult<Vec<Leave>>;

    fn members_on_leave(&self, from: NaiveDate, until: NaiveDate) -> RepoResult<BTreeSet<MemberId>> {
        Ok(self
            .list_leaves(from, until)?
            .into_iter()
            .map(|leave| leave.member_id)
            .collect())
    }
}

/// Write-side contract for registering leaves.
pub trait LeaveRepository: LeaveSource {
    fn record_leave(&self, leave: &Leave) -> RepoResult<()>;
}

/// SQLite-backed leave registry.
pub struct SqliteLeaveRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLeaveRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_version(conn)?;
        ensure_table(conn, "leaves")?;
        Ok(Self { conn })
    }
}

impl LeaveSource for SqliteLeaveRepository<'_> {
    fn list_leaves(&self, from: NaiveDate, until: NaiveDate) -> RepoResult<Vec<Leave>> {
        let mut stmt = self.conn.prepare(
            "SELECT member_id, start_on, end_on
             FROM leaves
             WHERE start_on <= ?2 AND end_on >= ?1
             ORDER BY member_id ASC, start_on ASC;",
        )?;

        let mut rows = stmt.query(params![from.to_string(), until.to_string()])?;
        let mut leaves = Vec::new();
        while let Some(row) = rows.next()? {
            let member_text: String = row.get(0)?;
            let start_text: String = row.get(1)?;
            let end_text: String = row.get(2)?;
            leaves.push(Leave {
                member_id: super::group_repo::parse_uuid(&member_text, "leaves.member_id")?,
                start_on: parse_date(&start_text, "leaves.start_on")?,
                end_on: parse_date(&end_text, "leaves.end_on")?,
            });
        }
        Ok(leaves)
    }
}

impl LeaveRepository for SqliteLeaveRepository<'_> {
    fn record_leave(&self, leave: &Leave) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO leaves (member_id, start_on, end_on)
             VALUES (?1, ?2, ?3);",
            params![
                leave.member_id.to_string(),
                leave.start_on.to_string(),
                leave.end_on.to_string(),
            ],
        )?;
        Ok(())
    }
}

pub(crate) fn parse_date(value: &str, context: &str) -> RepoResult<NaiveDate> {
    value.parse().map_err(|_| {
        crate::repo::RepoError::InvalidData(format!("invalid date value `{value}` in {context}"))
    })
}
