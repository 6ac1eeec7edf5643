use cellops_core::db::open_db_in_memory;
use cellops_core::model::member::CellGroup;
use cellops_core::model::ChurchId;
use cellops_core::repo::group_repo::{CellGroupRepository, SqliteCellGroupRepository};
use cellops_core::repo::membership_repo::{MembershipRepository, SqliteMembershipRepository};
use cellops_core::{
    AbsenteeInput, AttendeeInput, HealthService, ReportDraft, ReportService,
    SqliteReportRepository, VisitorInput,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn seed_group(conn: &Connection) -> CellGroup {
    let groups = SqliteCellGroupRepository::try_new(conn).unwrap();
    let group = CellGroup::new(ChurchId::new_v4(), "Alpha");
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

fn health_service(
    conn: &Connection,
) -> HealthService<SqliteReportRepository<'_>, SqliteMembershipRepository<'_>> {
    HealthService::new(
        SqliteReportRepository::try_new(conn).unwrap(),
        SqliteMembershipRepository::try_new(conn).unwrap(),
    )
}

fn seed_report(
    service: &ReportService<SqliteReportRepository<'_>, SqliteMembershipRepository<'_>>,
    group: &CellGroup,
    meeting_date: &str,
    attendees: &[Uuid],
    visitor_count: usize,
) -> Uuid {
    let draft = ReportDraft {
        church_id: Some(group.church_id),
        cell_group_id: Some(group.id),
        meeting_date: Some(date(meeting_date)),
        attendees: attendees.iter().copied().map(AttendeeInput::Id).collect(),
        visitors: (0..visitor_count)
            .map(|_| VisitorInput::Id(Uuid::new_v4()))
            .collect(),
        ..ReportDraft::default()
    };
    service.create(draft).unwrap().id
}

#[test]
fn zero_reports_in_window_scores_zero() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);
    let health = health_service(&conn);

    let snapshot = health
        .compute_health_score(group.id, date("2026-03-01"))
        .unwrap();
    assert_eq!(snapshot.reports_in_window, 0);
    assert_eq!(snapshot.health_score, 0.0);
    assert_eq!(snapshot.components.attendance_rate, 0.0);
    assert_eq!(snapshot.components.recency, 0.0);
}

#[test]
fn composite_score_matches_hand_computed_example() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);
    let memberships = SqliteMembershipRepository::try_new(&conn).unwrap();
    let service = report_service(&conn);

    // Ten long-standing members plus one who joins inside the window.
    let members: Vec<Uuid> = (0..10).map(|_| Uuid::new_v4()).collect();
    for member in &members {
        memberships
            .assign_member(group.id, *member, "member", date("2025-01-01"))
            .unwrap();
    }
    memberships
        .assign_member(group.id, Uuid::new_v4(), "member", date("2026-03-01"))
        .unwrap();

    // Three weekly reports, eight of ten attending, two visitors each.
    for meeting in ["2026-02-08", "2026-02-15", "2026-02-22"] {
        seed_report(&service, &group, meeting, &members[..8], 2);
    }

    // As of 2026-03-01 the six-week window starts 2026-01-18:
    // attendance 0.8, consistency 3/6, growth 1/10, visitors 2/5, recent.
    let health = health_service(&conn);
    let snapshot = health
        .compute_health_score(group.id, date("2026-03-01"))
        .unwrap();

    assert_eq!(snapshot.reports_in_window, 3);
    assert!((snapshot.components.attendance_rate - 0.8).abs() < 1e-9);
    assert!((snapshot.components.meeting_consistency - 0.5).abs() < 1e-9);
    assert!((snapshot.components.growth_rate - 0.1).abs() < 1e-9);
    assert!((snapshot.components.avg_visitors - 0.4).abs() < 1e-9);
    assert_eq!(snapshot.components.recency, 1.0);
    assert_eq!(snapshot.health_score, 59.50);
}

#[test]
fn soft_deleted_reports_do_not_contribute() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);
    let memberships = SqliteMembershipRepository::try_new(&conn).unwrap();
    let service = report_service(&conn);

    let member = Uuid::new_v4();
    memberships
        .assign_member(group.id, member, "member", date("2025-01-01"))
        .unwrap();
    let report_id = seed_report(&service, &group, "2026-02-22", &[member], 0);
    service.soft_delete(report_id, Uuid::new_v4()).unwrap();

    let health = health_service(&conn);
    let snapshot = health
        .compute_health_score(group.id, date("2026-03-01"))
        .unwrap();
    assert_eq!(snapshot.reports_in_window, 0);
    assert_eq!(snapshot.health_score, 0.0);
}

#[test]
fn stale_last_report_zeroes_recency() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);
    let memberships = SqliteMembershipRepository::try_new(&conn).unwrap();
    let service = report_service(&conn);

    let member = Uuid::new_v4();
    memberships
        .assign_member(group.id, member, "member", date("2025-01-01"))
        .unwrap();
    // Inside the window but older than the 14-day recency horizon.
    seed_report(&service, &group, "2026-02-01", &[member], 0);

    let health = health_service(&conn);
    let snapshot = health
        .compute_health_score(group.id, date("2026-03-01"))
        .unwrap();
    assert_eq!(snapshot.reports_in_window, 1);
    assert_eq!(snapshot.components.recency, 0.0);
}

#[test]
fn consecutive_absence_requires_member_in_every_recent_report() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);
    let service = report_service(&conn);
    let health = health_service(&conn);

    let member = Uuid::new_v4();
    for meeting in ["2026-02-01", "2026-02-08", "2026-02-15"] {
        let draft = ReportDraft {
            church_id: Some(group.church_id),
            cell_group_id: Some(group.id),
            meeting_date: Some(date(meeting)),
            absentees: vec![AbsenteeInput::Id(member)],
            ..ReportDraft::default()
        };
        service.create(draft).unwrap();
    }

    assert!(health.is_consecutive_absence(member, group.id, 3).unwrap());
    assert!(health.is_consecutive_absence(member, group.id, 2).unwrap());
    // Fewer reports exist than the requested streak length.
    assert!(!health.is_consecutive_absence(member, group.id, 4).unwrap());
}

#[test]
fn streak_breaks_when_the_member_attends_the_latest_meeting() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);
    let service = report_service(&conn);
    let health = health_service(&conn);

    let member = Uuid::new_v4();
    for meeting in ["2026-02-01", "2026-02-08"] {
        let draft = ReportDraft {
            church_id: Some(group.church_id),
            cell_group_id: Some(group.id),
            meeting_date: Some(date(meeting)),
            absentees: vec![AbsenteeInput::Id(member)],
            ..ReportDraft::default()
        };
        service.create(draft).unwrap();
    }
    let draft = ReportDraft {
        church_id: Some(group.church_id),
        cell_group_id: Some(group.id),
        meeting_date: Some(date("2026-02-15")),
        attendees: vec![AttendeeInput::Id(member)],
        ..ReportDraft::default()
    };
    service.create(draft).unwrap();

    assert!(!health.is_consecutive_absence(member, group.id, 2).unwrap());
}
