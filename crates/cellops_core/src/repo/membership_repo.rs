//! Roster (membership) repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Resolve the roster of a cell group as of any date.
//! - Answer the roster-size and join-date questions scoring depends on.
//! - Own membership write paths (assign, close).
//!
//! # Invariants
//! - A member is on roster as of D iff `assigned_on <= D` and `removed_on` is
//!   null or strictly after D.
//! - Membership rows are closed via `removed_on`, never deleted.
//! - Only the most recent open membership is authoritative for join dates.

use crate::model::member::MembershipRow;
use crate::model::{CellGroupId, MemberId};
use crate::repo::group_repo::parse_uuid;
use crate::repo::leave_repo::parse_date;
use crate::repo::{ensure_schema_version, ensure_table, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

/// Narrow read-only roster source consumed by reconciliation.
pub trait RosterSource {
    /// Lists memberships open as of `as_of`, one row per member.
    fn list_active_membership(
        &self,
        cell_group_id: CellGroupId,
        as_of: NaiveDate,
    ) -> RepoResult<Vec<MembershipRow>>;
}

/// Repository interface for roster resolution and membership lifecycle.
pub trait MembershipRepository: RosterSource {
    fn assign_member(
        &self,
        cell_group_id: CellGroupId,
        member_id: MemberId,
        role: &str,
        assigned_on: NaiveDate,
    ) -> RepoResult<()>;

    /// Closes the open membership by setting `removed_on`; a no-op when no
    /// open membership exists.
    fn close_membership(
        &self,
        cell_group_id: CellGroupId,
        member_id: MemberId,
        removed_on: NaiveDate,
    ) -> RepoResult<()>;

    fn roster_size_as_of(&self, cell_group_id: CellGroupId, as_of: NaiveDate) -> RepoResult<usize>;

    /// Distinct members whose membership started inside `(after, until]`.
    fn joins_between(
        &self,
        cell_group_id: CellGroupId,
        after: NaiveDate,
        until: NaiveDate,
    ) -> RepoResult<usize>;

    /// Join date of the most recent open membership, if any.
    fn roster_join_date(
        &self,
        cell_group_id: CellGroupId,
        member_id: MemberId,
    ) -> RepoResult<Option<NaiveDate>>;
}

/// SQLite-backed membership repository.
pub struct SqliteMembershipRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMembershipRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_version(conn)?;
        ensure_table(conn, "memberships")?;
        Ok(Self { conn })
    }
}

impl RosterSource for SqliteMembershipRepository<'_> {
    fn list_active_membership(
        &self,
        cell_group_id: CellGroupId,
        as_of: NaiveDate,
    ) -> RepoResult<Vec<MembershipRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT cell_group_id, member_id, role, MAX(assigned_on) AS assigned_on, removed_on
             FROM memberships
             WHERE cell_group_id = ?1
               AND assigned_on <= ?2
               AND (removed_on IS NULL OR removed_on > ?2)
             GROUP BY member_id
             ORDER BY member_id ASC;",
        )?;

        let mut rows = stmt.query(params![cell_group_id.to_string(), as_of.to_string()])?;
        let mut memberships = Vec::new();
        while let Some(row) = rows.next()? {
            let group_text: String = row.get(0)?;
            let member_text: String = row.get(1)?;
            let assigned_text: String = row.get(3)?;
            let removed_text: Option<String> = row.get(4)?;
            memberships.push(MembershipRow {
                cell_group_id: parse_uuid(&group_text, "memberships.cell_group_id")?,
                member_id: parse_uuid(&member_text, "memberships.member_id")?,
                role: row.get(2)?,
                assigned_on: parse_date(&assigned_text, "memberships.assigned_on")?,
                removed_on: removed_text
                    .map(|value| parse_date(&value, "memberships.removed_on"))
                    .transpose()?,
            });
        }
        Ok(memberships)
    }
}

impl MembershipRepository for SqliteMembershipRepository<'_> {
    fn assign_member(
        &self,
        cell_group_id: CellGroupId,
        member_id: MemberId,
        role: &str,
        assigned_on: NaiveDate,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO memberships (cell_group_id, member_id, role, assigned_on)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                cell_group_id.to_string(),
                member_id.to_string(),
                role,
                assigned_on.to_string(),
            ],
        )?;
        Ok(())
    }

    fn close_membership(
        &self,
        cell_group_id: CellGroupId,
        member_id: MemberId,
        removed_on: NaiveDate,
    ) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE memberships
             SET removed_on = ?3
             WHERE cell_group_id = ?1
               AND member_id = ?2
               AND removed_on IS NULL;",
            params![
                cell_group_id.to_string(),
                member_id.to_string(),
                removed_on.to_string(),
            ],
        )?;
        Ok(())
    }

    fn roster_size_as_of(&self, cell_group_id: CellGroupId, as_of: NaiveDate) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT member_id)
             FROM memberships
             WHERE cell_group_id = ?1
               AND assigned_on <= ?2
               AND (removed_on IS NULL OR removed_on > ?2);",
            params![cell_group_id.to_string(), as_of.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn joins_between(
        &self,
        cell_group_id: CellGroupId,
        after: NaiveDate,
        until: NaiveDate,
    ) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT member_id)
             FROM memberships
             WHERE cell_group_id = ?1
               AND assigned_on > ?2
               AND assigned_on <= ?3;",
            params![
                cell_group_id.to_string(),
                after.to_string(),
                until.to_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn roster_join_date(
        &self,
        cell_group_id: CellGroupId,
        member_id: MemberId,
    ) -> RepoResult<Option<NaiveDate>> {
        let assigned: Option<String> = self
            .conn
            .query_row(
                "SELECT assigned_on
                 FROM memberships
                 WHERE cell_group_id = ?1
                   AND member_id = ?2
                   AND removed_on IS NULL
                 ORDER BY assigned_on DESC
                 LIMIT 1;",
                params![cell_group_id.to_string(), member_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        assigned
            .map(|value| parse_date(&value, "memberships.assigned_on"))
            .transpose()
    }
}
