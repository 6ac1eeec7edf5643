//! Meeting report repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own the one-record-per-(group, meeting date) report store.
//! - Provide atomic append/remove mutators over the three child collections.
//! - Serve the windowed and grouped reads scoring and trends run on.
//!
//! # Invariants
//! - Every mutator runs in an immediate transaction and recomputes the
//!   derived counters from child-table counts before committing.
//! - Appends are idempotent under race: child-table uniqueness plus
//!   `INSERT OR IGNORE`, never an application-level read-modify-write.
//! - Absentees stay disjoint from attendees inside every transaction.
//! - Reports are soft-deleted only; deleted reports are excluded from all
//!   aggregate read paths.

use crate::model::report::{AbsenteeEntry, AttendeeEntry, MeetingReport, NewMeetingReport, VisitorEntry};
use crate::model::{epoch_ms_now, CellGroupId, ChurchId, MemberId, ReportId};
use crate::repo::group_repo::parse_uuid;
use crate::repo::leave_repo::parse_date;
use crate::repo::{
    ensure_column, ensure_schema_version, ensure_table, with_immediate_tx, RepoError, RepoResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

/// One group's standing for a single meeting date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekStanding {
    pub cell_group_id: CellGroupId,
    pub total_attendance: i64,
}

/// One leaderboard line: a group and its summed metric over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardRow {
    pub cell_group_id: CellGroupId,
    pub total: i64,
}

/// Metric summed by the leaderboard query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardMetric {
    Attendance,
    Visitors,
    Absentees,
    Souls,
}

impl LeaderboardMetric {
    fn column(self) -> &'static str {
        match self {
            Self::Attendance => "attendance_count",
            Self::Visitors => "visitors_count",
            Self::Absentees => "absentees_count",
            Self::Souls => "souls_recorded",
        }
    }
}

/// Repository interface for meeting report persistence and aggregation.
pub trait ReportRepository {
    fn create(&self, new: &NewMeetingReport) -> RepoResult<MeetingReport>;
    fn get(&self, id: ReportId, include_deleted: bool) -> RepoResult<Option<MeetingReport>>;
    fn add_attendee(
        &self,
        id: ReportId,
        member_id: MemberId,
        joined_at: i64,
    ) -> RepoResult<MeetingReport>;
    fn remove_attendee(&self, id: ReportId, member_id: MemberId) -> RepoResult<MeetingReport>;
    fn add_visitor(&self, id: ReportId, entry: &VisitorEntry) -> RepoResult<MeetingReport>;
    fn add_absentee(&self, id: ReportId, entry: &AbsenteeEntry) -> RepoResult<MeetingReport>;
    fn soft_delete(&self, id: ReportId, deleted_by: Uuid) -> RepoResult<()>;

    /// Non-deleted reports with `after < meeting_date <= until`, date ascending.
    fn reports_in_window(
        &self,
        cell_group_id: CellGroupId,
        after: NaiveDate,
        until: NaiveDate,
    ) -> RepoResult<Vec<MeetingReport>>;

    /// The `n` most recent non-deleted reports, date descending.
    fn last_reports(&self, cell_group_id: CellGroupId, n: u32) -> RepoResult<Vec<MeetingReport>>;

    fn week_top(&self, church_id: ChurchId, date: NaiveDate) -> RepoResult<Option<WeekStanding>>;
    fn week_bottom(&self, church_id: ChurchId, date: NaiveDate) -> RepoResult<Option<WeekStanding>>;

    fn leaderboard(
        &self,
        church_id: ChurchId,
        start: NaiveDate,
        end: NaiveDate,
        metric: LeaderboardMetric,
        limit: u32,
    ) -> RepoResult<Vec<LeaderboardRow>>;
}

/// SQLite-backed meeting report repository.
pub struct SqliteReportRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReportRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_version(conn)?;
        for table in [
            "meeting_reports",
            "report_attendees",
            "report_visitors",
            "report_absentees",
        ] {
            ensure_table(conn, table)?;
        }
        ensure_column(conn, "meeting_reports", "souls_recorded")?;
        Ok(Self { conn })
    }
}

impl ReportRepository for SqliteReportRepository<'_> {
    fn create(&self, new: &NewMeetingReport) -> RepoResult<MeetingReport> {
        let report_id = Uuid::new_v4();
        let now = epoch_ms_now();

        with_immediate_tx(self.conn, |tx| {
            let group_exists: i64 = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM cell_groups WHERE id = ?1);",
                [new.cell_group_id.to_string()],
                |row| row.get(0),
            )?;
            if group_exists == 0 {
                return Err(RepoError::CellGroupNotFound(new.cell_group_id));
            }

            let duplicate: i64 = tx.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM meeting_reports
                    WHERE cell_group_id = ?1 AND meeting_date = ?2 AND is_deleted = 0
                );",
                params![new.cell_group_id.to_string(), new.meeting_date.to_string()],
                |row| row.get(0),
            )?;
            if duplicate == 1 {
                return Err(RepoError::DuplicateReport {
                    cell_group_id: new.cell_group_id,
                    meeting_date: new.meeting_date,
                });
            }

            tx.execute(
                "INSERT INTO meeting_reports (
                    id, church_id, cell_group_id, meeting_date,
                    souls_recorded, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6);",
                params![
                    report_id.to_string(),
                    new.church_id.to_string(),
                    new.cell_group_id.to_string(),
                    new.meeting_date.to_string(),
                    i64::from(new.souls_recorded),
                    now,
                ],
            )?;

            for attendee in &new.attendees {
                insert_attendee(tx, report_id, attendee.member_id, attendee.joined_at)?;
            }
            for visitor in &new.visitors {
                insert_visitor(tx, report_id, visitor)?;
            }
            for absentee in &new.absentees {
                insert_absentee(tx, report_id, absentee)?;
            }

            refresh_counters(tx, report_id, now)?;
            load_report(tx, report_id, true)?.ok_or(RepoError::ReportNotFound(report_id))
        })
    }

    fn get(&self, id: ReportId, include_deleted: bool) -> RepoResult<Option<MeetingReport>> {
        load_report(self.conn, id, include_deleted)
    }

    fn add_attendee(
        &self,
        id: ReportId,
        member_id: MemberId,
        joined_at: i64,
    ) -> RepoResult<MeetingReport> {
        with_immediate_tx(self.conn, |tx| {
            ensure_live_report(tx, id)?;
            insert_attendee(tx, id, member_id, joined_at)?;
            // Keep attendees and absentees disjoint: a member who showed up
            // cannot stay recorded as absent.
            tx.execute(
                "DELETE FROM report_absentees WHERE report_id = ?1 AND member_id = ?2;",
                params![id.to_string(), member_id.to_string()],
            )?;
            refresh_counters(tx, id, epoch_ms_now())?;
            load_report(tx, id, false)?.ok_or(RepoError::ReportNotFound(id))
        })
    }

    fn remove_attendee(&self, id: ReportId, member_id: MemberId) -> RepoResult<MeetingReport> {
        with_immediate_tx(self.conn, |tx| {
            ensure_live_report(tx, id)?;
            // Removing a non-present member is a defined no-op.
            tx.execute(
                "DELETE FROM report_attendees WHERE report_id = ?1 AND member_id = ?2;",
                params![id.to_string(), member_id.to_string()],
            )?;
            refresh_counters(tx, id, epoch_ms_now())?;
            load_report(tx, id, false)?.ok_or(RepoError::ReportNotFound(id))
        })
    }

    fn add_visitor(&self, id: ReportId, entry: &VisitorEntry) -> RepoResult<MeetingReport> {
        with_immediate_tx(self.conn, |tx| {
            ensure_live_report(tx, id)?;
            insert_visitor(tx, id, entry)?;
            refresh_counters(tx, id, epoch_ms_now())?;
            load_report(tx, id, false)?.ok_or(RepoError::ReportNotFound(id))
        })
    }

    fn add_absentee(&self, id: ReportId, entry: &AbsenteeEntry) -> RepoResult<MeetingReport> {
        entry.validate()?;
        with_immediate_tx(self.conn, |tx| {
            ensure_live_report(tx, id)?;
            insert_absentee(tx, id, entry)?;
            refresh_counters(tx, id, epoch_ms_now())?;
            load_report(tx, id, false)?.ok_or(RepoError::ReportNotFound(id))
        })
    }

    fn soft_delete(&self, id: ReportId, deleted_by: Uuid) -> RepoResult<()> {
        let now = epoch_ms_now();
        with_immediate_tx(self.conn, |tx| {
            let changed = tx.execute(
                "UPDATE meeting_reports
                 SET is_deleted = 1, deleted_at = ?2, deleted_by = ?3, updated_at = ?2
                 WHERE id = ?1 AND is_deleted = 0;",
                params![id.to_string(), now, deleted_by.to_string()],
            )?;
            if changed == 0 {
                return Err(RepoError::ReportNotFound(id));
            }
            Ok(())
        })
    }

    fn reports_in_window(
        &self,
        cell_group_id: CellGroupId,
        after: NaiveDate,
        until: NaiveDate,
    ) -> RepoResult<Vec<MeetingReport>> {
        let ids = report_ids(
            self.conn,
            "SELECT id FROM meeting_reports
             WHERE cell_group_id = ?1 AND is_deleted = 0
               AND meeting_date > ?2 AND meeting_date <= ?3
             ORDER BY meeting_date ASC;",
            params![
                cell_group_id.to_string(),
                after.to_string(),
                until.to_string()
            ],
        )?;
        load_reports(self.conn, &ids)
    }

    fn last_reports(&self, cell_group_id: CellGroupId, n: u32) -> RepoResult<Vec<MeetingReport>> {
        let ids = report_ids(
            self.conn,
            "SELECT id FROM meeting_reports
             WHERE cell_group_id = ?1 AND is_deleted = 0
             ORDER BY meeting_date DESC
             LIMIT ?2;",
            params![cell_group_id.to_string(), i64::from(n)],
        )?;
        load_reports(self.conn, &ids)
    }

    fn week_top(&self, church_id: ChurchId, date: NaiveDate) -> RepoResult<Option<WeekStanding>> {
        week_extreme(self.conn, church_id, date, "DESC")
    }

    fn week_bottom(&self, church_id: ChurchId, date: NaiveDate) -> RepoResult<Option<WeekStanding>> {
        week_extreme(self.conn, church_id, date, "ASC")
    }

    fn leaderboard(
        &self,
        church_id: ChurchId,
        start: NaiveDate,
        end: NaiveDate,
        metric: LeaderboardMetric,
        limit: u32,
    ) -> RepoResult<Vec<LeaderboardRow>> {
        let sql = format!(
            "SELECT cell_group_id, SUM({column}) AS total
             FROM meeting_reports
             WHERE church_id = ?1 AND is_deleted = 0
               AND meeting_date >= ?2 AND meeting_date <= ?3
             GROUP BY cell_group_id
             ORDER BY total DESC, cell_group_id ASC
             LIMIT ?4;",
            column = metric.column()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            church_id.to_string(),
            start.to_string(),
            end.to_string(),
            i64::from(limit),
        ])?;

        let mut standings = Vec::new();
        while let Some(row) = rows.next()? {
            let group_text: String = row.get(0)?;
            standings.push(LeaderboardRow {
                cell_group_id: parse_uuid(&group_text, "meeting_reports.cell_group_id")?,
                total: row.get(1)?,
            });
        }
        Ok(standings)
    }
}

fn week_extreme(
    conn: &Connection,
    church_id: ChurchId,
    date: NaiveDate,
    direction: &str,
) -> RepoResult<Option<WeekStanding>> {
    let sql = format!(
        "SELECT cell_group_id, attendance_count
         FROM meeting_reports
         WHERE church_id = ?1 AND meeting_date = ?2 AND is_deleted = 0
         ORDER BY attendance_count {direction}, cell_group_id ASC
         LIMIT 1;"
    );

    conn.query_row(
        &sql,
        params![church_id.to_string(), date.to_string()],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
    )
    .optional()?
    .map(|(group_text, total_attendance)| {
        Ok(WeekStanding {
            cell_group_id: parse_uuid(&group_text, "meeting_reports.cell_group_id")?,
            total_attendance,
        })
    })
    .transpose()
}

fn ensure_live_report(conn: &Connection, id: ReportId) -> RepoResult<()> {
    let live: Option<i64> = conn
        .query_row(
            "SELECT is_deleted FROM meeting_reports WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match live {
        Some(0) => Ok(()),
        _ => Err(RepoError::ReportNotFound(id)),
    }
}

fn insert_attendee(
    conn: &Connection,
    report_id: ReportId,
    member_id: MemberId,
    joined_at: i64,
) -> RepoResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO report_attendees (report_id, member_id, joined_at)
         VALUES (?1, ?2, ?3);",
        params![report_id.to_string(), member_id.to_string(), joined_at],
    )?;
    Ok(())
}

fn insert_visitor(conn: &Connection, report_id: ReportId, entry: &VisitorEntry) -> RepoResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO report_visitors
            (report_id, visitor_id, name, followup_action, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            report_id.to_string(),
            entry.visitor_id.map(|id| id.to_string()),
            entry.name.as_deref(),
            entry.followup_action.as_deref(),
            entry.created_at,
        ],
    )?;
    Ok(())
}

fn insert_absentee(conn: &Connection, report_id: ReportId, entry: &AbsenteeEntry) -> RepoResult<()> {
    entry.validate()?;
    // The guard keeps the disjointness invariant: a member currently recorded
    // as an attendee cannot also be appended as an absentee.
    conn.execute(
        "INSERT OR IGNORE INTO report_absentees
            (report_id, member_id, visitor_id, reason, followup_action, created_at)
         SELECT ?1, ?2, ?3, ?4, ?5, ?6
         WHERE ?2 IS NULL OR NOT EXISTS (
            SELECT 1 FROM report_attendees
            WHERE report_id = ?1 AND member_id = ?2
         );",
        params![
            report_id.to_string(),
            entry.member_id.map(|id| id.to_string()),
            entry.visitor_id.map(|id| id.to_string()),
            entry.reason.as_str(),
            entry.followup_action.as_deref(),
            entry.created_at,
        ],
    )?;
    Ok(())
}

/// Recomputes derived counters from child-table counts. Runs inside the same
/// transaction as the mutation that made them stale.
fn refresh_counters(conn: &Connection, report_id: ReportId, now: i64) -> RepoResult<()> {
    conn.execute(
        "UPDATE meeting_reports SET
            attendance_count = (SELECT COUNT(*) FROM report_attendees WHERE report_id = ?1),
            visitors_count = (SELECT COUNT(*) FROM report_visitors WHERE report_id = ?1),
            absentees_count = (SELECT COUNT(*) FROM report_absentees WHERE report_id = ?1),
            updated_at = ?2
         WHERE id = ?1;",
        params![report_id.to_string(), now],
    )?;
    Ok(())
}

fn report_ids(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> RepoResult<Vec<ReportId>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get(0)?;
        ids.push(parse_uuid(&id_text, "meeting_reports.id")?);
    }
    Ok(ids)
}

fn load_reports(conn: &Connection, ids: &[ReportId]) -> RepoResult<Vec<MeetingReport>> {
    let mut reports = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(report) = load_report(conn, *id, false)? {
            reports.push(report);
        }
    }
    Ok(reports)
}

fn load_report(
    conn: &Connection,
    id: ReportId,
    include_deleted: bool,
) -> RepoResult<Option<MeetingReport>> {
    let header = conn
        .query_row(
            "SELECT
                id, church_id, cell_group_id, meeting_date,
                attendance_count, visitors_count, absentees_count,
                souls_recorded, is_deleted, deleted_at, deleted_by,
                created_at, updated_at
             FROM meeting_reports
             WHERE id = ?1 AND (?2 = 1 OR is_deleted = 0);",
            params![id.to_string(), i64::from(include_deleted)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, Option<i64>>(9)?,
                    row.get::<_, Option<String>>(10)?,
                    row.get::<_, i64>(11)?,
                    row.get::<_, i64>(12)?,
                ))
            },
        )
        .optional()?;

    let Some((
        id_text,
        church_text,
        group_text,
        date_text,
        attendance_count,
        visitors_count,
        absentees_count,
        souls_recorded,
        is_deleted,
        deleted_at,
        deleted_by_text,
        created_at,
        updated_at,
    )) = header
    else {
        return Ok(None);
    };

    let report_id = parse_uuid(&id_text, "meeting_reports.id")?;
    Ok(Some(MeetingReport {
        id: report_id,
        church_id: parse_uuid(&church_text, "meeting_reports.church_id")?,
        cell_group_id: parse_uuid(&group_text, "meeting_reports.cell_group_id")?,
        meeting_date: parse_date(&date_text, "meeting_reports.meeting_date")?,
        attendees: load_attendees(conn, report_id)?,
        visitors: load_visitors(conn, report_id)?,
        absentees: load_absentees(conn, report_id)?,
        attendance_count: attendance_count as usize,
        visitors_count: visitors_count as usize,
        absentees_count: absentees_count as usize,
        souls_recorded: souls_recorded as u32,
        is_deleted: is_deleted != 0,
        deleted_at,
        deleted_by: deleted_by_text
            .map(|value| parse_uuid(&value, "meeting_reports.deleted_by"))
            .transpose()?,
        created_at,
        updated_at,
    }))
}

fn load_attendees(conn: &Connection, report_id: ReportId) -> RepoResult<Vec<AttendeeEntry>> {
    let mut stmt = conn.prepare(
        "SELECT member_id, joined_at
         FROM report_attendees
         WHERE report_id = ?1
         ORDER BY id ASC;",
    )?;
    let mut rows = stmt.query([report_id.to_string()])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        let member_text: String = row.get(0)?;
        entries.push(AttendeeEntry {
            member_id: parse_uuid(&member_text, "report_attendees.member_id")?,
            joined_at: row.get(1)?,
        });
    }
    Ok(entries)
}

fn load_visitors(conn: &Connection, report_id: ReportId) -> RepoResult<Vec<VisitorEntry>> {
    let mut stmt = conn.prepare(
        "SELECT visitor_id, name, followup_action, created_at
         FROM report_visitors
         WHERE report_id = ?1
         ORDER BY id ASC;",
    )?;
    let mut rows = stmt.query([report_id.to_string()])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        let visitor_text: Option<String> = row.get(0)?;
        entries.push(VisitorEntry {
            visitor_id: visitor_text
                .map(|value| parse_uuid(&value, "report_visitors.visitor_id"))
                .transpose()?,
            name: row.get(1)?,
            followup_action: row.get(2)?,
            created_at: row.get(3)?,
        });
    }
    Ok(entries)
}

fn load_absentees(conn: &Connection, report_id: ReportId) -> RepoResult<Vec<AbsenteeEntry>> {
    let mut stmt = conn.prepare(
        "SELECT member_id, visitor_id, reason, followup_action, created_at
         FROM report_absentees
         WHERE report_id = ?1
         ORDER BY id ASC;",
    )?;
    let mut rows = stmt.query([report_id.to_string()])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        let member_text: Option<String> = row.get(0)?;
        let visitor_text: Option<String> = row.get(1)?;
        entries.push(AbsenteeEntry {
            member_id: member_text
                .map(|value| parse_uuid(&value, "report_absentees.member_id"))
                .transpose()?,
            visitor_id: visitor_text
                .map(|value| parse_uuid(&value, "report_absentees.visitor_id"))
                .transpose()?,
            reason: row.get(2)?,
            followup_action: row.get(3)?,
            created_at: row.get(4)?,
        });
    }
    Ok(entries)
}
