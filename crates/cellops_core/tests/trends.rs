use cellops_core::db::open_db_in_memory;
use cellops_core::model::member::CellGroup;
use cellops_core::model::ChurchId;
use cellops_core::repo::group_repo::{CellGroupRepository, SqliteCellGroupRepository};
use cellops_core::repo::membership_repo::SqliteMembershipRepository;
use cellops_core::{
    AttendeeInput, ReportDraft, ReportService, SqliteReportRepository, TrendService, VisitorInput,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn seed_group(conn: &Connection, church_id: ChurchId, name: &str) -> CellGroup {
    let groups = SqliteCellGroupRepository::try_new(conn).unwrap();
    let group = CellGroup::new(church_id, name);
    groups.create_cell_group(&group).unwrap();
    group
}

fn report_service(
    conn: &Connection,
) -> ReportService<SqliteReportRepository<'_>, SqliteMembershipRepository<'_>> {
    ReportService::new(
        SqliteReportRepository::try_new(conn).unwrap(),
        SqliteMembershipRepository::try_new(conn).unwrap(),
    )
}

fn trend_service(conn: &Connection) -> TrendService<SqliteReportRepository<'_>> {
    TrendService::new(SqliteReportRepository::try_new(conn).unwrap())
}

fn seed_report(
    service: &ReportService<SqliteReportRepository<'_>, SqliteMembershipRepository<'_>>,
    group: &CellGroup,
    meeting_date: &str,
    attendee_count: usize,
    visitor_count: usize,
    souls: u32,
) -> Uuid {
    let draft = ReportDraft {
        church_id: Some(group.church_id),
        cell_group_id: Some(group.id),
        meeting_date: Some(date(meeting_date)),
        attendees: (0..attendee_count)
            .map(|_| AttendeeInput::Id(Uuid::new_v4()))
            .collect(),
        visitors: (0..visitor_count)
            .map(|_| VisitorInput::Id(Uuid::new_v4()))
            .collect(),
        souls_recorded: Some(souls),
        ..ReportDraft::default()
    };
    service.create(draft).unwrap().id
}

#[test]
fn week_extremes_pick_highest_and_lowest_attendance() {
    let conn = open_db_in_memory().unwrap();
    let church = ChurchId::new_v4();
    let alpha = seed_group(&conn, church, "Alpha");
    let beta = seed_group(&conn, church, "Beta");
    let service = report_service(&conn);

    seed_report(&service, &alpha, "2026-03-01", 9, 0, 0);
    seed_report(&service, &beta, "2026-03-01", 4, 0, 0);

    let trends = trend_service(&conn);
    let top = trends.top_cell_for_week(church, date("2026-03-01")).unwrap().unwrap();
    assert_eq!(top.cell_group_id, alpha.id);
    assert_eq!(top.total_attendance, 9);

    let bottom = trends
        .bottom_cell_for_week(church, date("2026-03-01"))
        .unwrap()
        .unwrap();
    assert_eq!(bottom.cell_group_id, beta.id);
    assert_eq!(bottom.total_attendance, 4);
}

#[test]
fn week_without_reports_yields_none() {
    let conn = open_db_in_memory().unwrap();
    let church = ChurchId::new_v4();
    seed_group(&conn, church, "Alpha");

    let trends = trend_service(&conn);
    assert!(trends
        .top_cell_for_week(church, date("2026-03-01"))
        .unwrap()
        .is_none());
    assert!(trends
        .bottom_cell_for_week(church, date("2026-03-01"))
        .unwrap()
        .is_none());
}

#[test]
fn attendance_ties_break_by_ascending_group_id() {
    let conn = open_db_in_memory().unwrap();
    let church = ChurchId::new_v4();
    let alpha = seed_group(&conn, church, "Alpha");
    let beta = seed_group(&conn, church, "Beta");
    let service = report_service(&conn);

    seed_report(&service, &alpha, "2026-03-01", 5, 0, 0);
    seed_report(&service, &beta, "2026-03-01", 5, 0, 0);

    let expected = alpha.id.min(beta.id);
    let trends = trend_service(&conn);
    let top = trends.top_cell_for_week(church, date("2026-03-01")).unwrap().unwrap();
    let bottom = trends
        .bottom_cell_for_week(church, date("2026-03-01"))
        .unwrap()
        .unwrap();
    assert_eq!(top.cell_group_id, expected);
    assert_eq!(bottom.cell_group_id, expected);
}

#[test]
fn leaderboards_sum_each_metric_over_the_range() {
    let conn = open_db_in_memory().unwrap();
    let church = ChurchId::new_v4();
    let alpha = seed_group(&conn, church, "Alpha");
    let beta = seed_group(&conn, church, "Beta");
    let service = report_service(&conn);

    seed_report(&service, &alpha, "2026-03-01", 6, 1, 2);
    seed_report(&service, &alpha, "2026-03-08", 4, 2, 1);
    seed_report(&service, &beta, "2026-03-08", 7, 0, 0);

    let trends = trend_service(&conn);
    let boards = trends
        .leaderboards(church, date("2026-03-01"), date("2026-03-31"), 10)
        .unwrap();

    assert_eq!(boards.attendance.len(), 2);
    assert_eq!(boards.attendance[0].cell_group_id, alpha.id);
    assert_eq!(boards.attendance[0].total, 10);
    assert_eq!(boards.attendance[1].cell_group_id, beta.id);
    assert_eq!(boards.attendance[1].total, 7);

    assert_eq!(boards.visitors[0].cell_group_id, alpha.id);
    assert_eq!(boards.visitors[0].total, 3);

    assert_eq!(boards.souls[0].cell_group_id, alpha.id);
    assert_eq!(boards.souls[0].total, 3);
}

#[test]
fn leaderboard_limit_truncates_rows() {
    let conn = open_db_in_memory().unwrap();
    let church = ChurchId::new_v4();
    let service = report_service(&conn);
    for (index, name) in ["Alpha", "Beta", "Gamma"].iter().enumerate() {
        let group = seed_group(&conn, church, name);
        seed_report(&service, &group, "2026-03-01", index + 1, 0, 0);
    }

    let trends = trend_service(&conn);
    let boards = trends
        .leaderboards(church, date("2026-03-01"), date("2026-03-31"), 2)
        .unwrap();
    assert_eq!(boards.attendance.len(), 2);
    assert_eq!(boards.attendance[0].total, 3);
    assert_eq!(boards.attendance[1].total, 2);
}

#[test]
fn soft_deleted_reports_are_excluded_from_aggregates() {
    let conn = open_db_in_memory().unwrap();
    let church = ChurchId::new_v4();
    let alpha = seed_group(&conn, church, "Alpha");
    let beta = seed_group(&conn, church, "Beta");
    let service = report_service(&conn);

    let deleted = seed_report(&service, &alpha, "2026-03-01", 9, 0, 0);
    seed_report(&service, &beta, "2026-03-01", 4, 0, 0);
    service.soft_delete(deleted, Uuid::new_v4()).unwrap();

    let trends = trend_service(&conn);
    let top = trends.top_cell_for_week(church, date("2026-03-01")).unwrap().unwrap();
    assert_eq!(top.cell_group_id, beta.id);

    let boards = trends
        .leaderboards(church, date("2026-03-01"), date("2026-03-31"), 10)
        .unwrap();
    assert_eq!(boards.attendance.len(), 1);
    assert_eq!(boards.attendance[0].cell_group_id, beta.id);
}

#[test]
fn other_churches_do_not_leak_into_standings() {
    let conn = open_db_in_memory().unwrap();
    let church = ChurchId::new_v4();
    let other_church = ChurchId::new_v4();
    let mine = seed_group(&conn, church, "Alpha");
    let theirs = seed_group(&conn, other_church, "Zeta");
    let service = report_service(&conn);

    seed_report(&service, &mine, "2026-03-01", 3, 0, 0);
    seed_report(&service, &theirs, "2026-03-01", 30, 0, 0);

    let trends = trend_service(&conn);
    let top = trends.top_cell_for_week(church, date("2026-03-01")).unwrap().unwrap();
    assert_eq!(top.cell_group_id, mine.id);
    assert_eq!(top.total_attendance, 3);
}
