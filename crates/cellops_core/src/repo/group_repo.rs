//! Cell group repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own the `cell_groups` rows reports and rosters reference.
//!
//! # Invariants
//! - Group deactivation never deletes the row; history stays resolvable.

use crate::model::member::CellGroup;
use crate::model::CellGroupId;
use crate::repo::{ensure_schema_version, ensure_table, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Repository interface for cell group records.
pub trait CellGroupRepository {
    fn create_cell_group(&self, group: &CellGroup) -> RepoResult<CellGroupId>;
    fn get_cell_group(&self, id: CellGroupId) -> RepoResult<Option<CellGroup>>;
    fn cell_group_exists(&self, id: CellGroupId) -> RepoResult<bool>;
}

/// SQLite-backed cell group repository.
pub struct SqliteCellGroupRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCellGroupRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_version(conn)?;
        ensure_table(conn, "cell_groups")?;
        Ok(Self { conn })
    }
}

impl CellGroupRepository for SqliteCellGroupRepository<'_> {
    fn create_cell_group(&self, group: &CellGroup) -> RepoResult<CellGroupId> {
        self.conn.execute(
            "INSERT INTO cell_groups (id, church_id, name, is_active)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                group.id.to_string(),
                group.church_id.to_string(),
                group.name.as_str(),
                i64::from(group.is_active),
            ],
        )?;
        Ok(group.id)
    }

    fn get_cell_group(&self, id: CellGroupId) -> RepoResult<Option<CellGroup>> {
        self.conn
            .query_row(
                "SELECT id, church_id, name, is_active
                 FROM cell_groups
                 WHERE id = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?
            .map(|(id_text, church_text, name, is_active)| {
                Ok(CellGroup {
                    id: parse_uuid(&id_text, "cell_groups.id")?,
                    church_id: parse_uuid(&church_text, "cell_groups.church_id")?,
                    name,
                    is_active: is_active != 0,
                })
            })
            .transpose()
    }

    fn cell_group_exists(&self, id: CellGroupId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cell_groups WHERE id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

pub(crate) fn parse_uuid(value: &str, context: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {context}")))
}
