//! Member directory repository and read-only enrichment lookup.
//!
//! # Responsibility
//! - Provide upsert/read access to the externally-owned member directory.
//! - Expose the narrow `MemberDirectory` lookup reconciliation enriches with.
//!
//! # Invariants
//! - Core never deletes member rows.
//! - Directory lookups are for display enrichment only and must never be
//!   required for count correctness.

use crate::model::member::{Member, MemberStatus};
use crate::model::MemberId;
use crate::repo::group_repo::parse_uuid;
use crate::repo::{ensure_schema_version, ensure_table, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Narrow read-only lookup used for display-name enrichment.
pub trait MemberDirectory {
    fn display_name(&self, member_id: MemberId) -> RepoResult<Option<String>>;
}

/// Repository interface for the member directory.
pub trait MemberRepository {
    fn upsert_member(&self, member: &Member) -> RepoResult<()>;
    fn get_member(&self, id: MemberId) -> RepoResult<Option<Member>>;
}

/// SQLite-backed member directory.
pub struct SqliteMemberRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemberRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_version(conn)?;
        ensure_table(conn, "members")?;
        Ok(Self { conn })
    }
}

impl MemberRepository for SqliteMemberRepository<'_> {
    fn upsert_member(&self, member: &Member) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO members (id, display_name, status, zone)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                status = excluded.status,
                zone = excluded.zone;",
            params![
                member.id.to_string(),
                member.display_name.as_str(),
                status_to_db(member.status),
                member.zone.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn get_member(&self, id: MemberId) -> RepoResult<Option<Member>> {
        self.conn
            .query_row(
                "SELECT id, display_name, status, zone
                 FROM members
                 WHERE id = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?
            .map(|(id_text, display_name, status_text, zone)| {
                Ok(Member {
                    id: parse_uuid(&id_text, "members.id")?,
                    display_name,
                    status: parse_status(&status_text)?,
                    zone,
                })
            })
            .transpose()
    }
}

impl MemberDirectory for SqliteMemberRepository<'_> {
    fn display_name(&self, member_id: MemberId) -> RepoResult<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT display_name FROM members WHERE id = ?1;",
                [member_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }
}

fn status_to_db(status: MemberStatus) -> &'static str {
    match status {
        MemberStatus::Active => "active",
        MemberStatus::Inactive => "inactive",
    }
}

fn parse_status(value: &str) -> RepoResult<MemberStatus> {
    match value {
        "active" => Ok(MemberStatus::Active),
        "inactive" => Ok(MemberStatus::Inactive),
        other => Err(RepoError::InvalidData(format!(
            "invalid member status `{other}` in members.status"
        ))),
    }
}
