use cellops_core::db::open_db_in_memory;
use cellops_core::model::member::{CellGroup, Leave, Member, MemberStatus};
use cellops_core::model::ChurchId;
use cellops_core::repo::group_repo::{CellGroupRepository, SqliteCellGroupRepository};
use cellops_core::repo::leave_repo::{LeaveRepository, SqliteLeaveRepository};
use cellops_core::repo::member_repo::{MemberRepository, SqliteMemberRepository};
use cellops_core::repo::membership_repo::{MembershipRepository, SqliteMembershipRepository};
use cellops_core::ReconcileService;
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

fn assign(conn: &Connection, group: &CellGroup, member: Uuid, since: &str) {
    let memberships = SqliteMembershipRepository::try_new(conn).unwrap();
    memberships
        .assign_member(group.id, member, "member", date(since))
        .unwrap();
}

#[test]
fn roster_minus_attendees_becomes_expected_absentees() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);
    let (m1, m2, m3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    for member in [m1, m2, m3] {
        assign(&conn, &group, member, "2025-01-01");
    }

    let memberships = SqliteMembershipRepository::try_new(&conn).unwrap();
    let service = ReconcileService::new(memberships);
    let absentees = service.compute_absentees(group.id, date("2026-03-01"), &[m1, m2], None);

    assert_eq!(absentees.len(), 1);
    assert_eq!(absentees[0].member_id, m3);
    assert_eq!(absentees[0].reason, "expected");
    assert!(absentees[0].expected);
}

#[test]
fn members_on_leave_are_excused() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);
    let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
    assign(&conn, &group, m1, "2025-01-01");
    assign(&conn, &group, m2, "2025-01-01");

    let leaves = SqliteLeaveRepository::try_new(&conn).unwrap();
    leaves
        .record_leave(&Leave {
            member_id: m2,
            start_on: date("2026-02-25"),
            end_on: date("2026-03-05"),
        })
        .unwrap();

    let memberships = SqliteMembershipRepository::try_new(&conn).unwrap();
    let service = ReconcileService::new(memberships).with_leave_source(&leaves);
    let absentees = service.compute_absentees(group.id, date("2026-03-01"), &[], None);

    assert_eq!(absentees.len(), 1);
    assert_eq!(absentees[0].member_id, m1);
}

#[test]
fn leave_outside_the_checked_interval_does_not_excuse() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);
    let member = Uuid::new_v4();
    assign(&conn, &group, member, "2025-01-01");

    let leaves = SqliteLeaveRepository::try_new(&conn).unwrap();
    leaves
        .record_leave(&Leave {
            member_id: member,
            start_on: date("2026-03-10"),
            end_on: date("2026-03-20"),
        })
        .unwrap();

    let memberships = SqliteMembershipRepository::try_new(&conn).unwrap();
    let service = ReconcileService::new(memberships).with_leave_source(&leaves);
    let absentees = service.compute_absentees(group.id, date("2026-03-01"), &[], None);

    assert_eq!(absentees.len(), 1);

    // Widening the interval to cover the leave excuses the member.
    let excused = service.compute_absentees(
        group.id,
        date("2026-03-01"),
        &[],
        Some(date("2026-03-15")),
    );
    assert!(excused.is_empty());
}

#[test]
fn closed_memberships_are_not_on_the_roster() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);
    let member = Uuid::new_v4();
    assign(&conn, &group, member, "2025-01-01");

    let memberships = SqliteMembershipRepository::try_new(&conn).unwrap();
    memberships
        .close_membership(group.id, member, date("2026-01-31"))
        .unwrap();

    let service = ReconcileService::new(SqliteMembershipRepository::try_new(&conn).unwrap());
    let absentees = service.compute_absentees(group.id, date("2026-03-01"), &[], None);
    assert!(absentees.is_empty());

    // Before the removal date the member still counts.
    let earlier = service.compute_absentees(group.id, date("2026-01-15"), &[], None);
    assert_eq!(earlier.len(), 1);
}

#[test]
fn empty_roster_yields_no_absentees() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);

    let memberships = SqliteMembershipRepository::try_new(&conn).unwrap();
    let service = ReconcileService::new(memberships);
    let absentees =
        service.compute_absentees(group.id, date("2026-03-01"), &[Uuid::new_v4()], None);
    assert!(absentees.is_empty());
}

#[test]
fn display_names_come_from_the_member_directory() {
    let conn = open_db_in_memory().unwrap();
    let group = seed_group(&conn);
    let member = Uuid::new_v4();
    assign(&conn, &group, member, "2025-01-01");

    let members = SqliteMemberRepository::try_new(&conn).unwrap();
    members
        .upsert_member(&Member {
            id: member,
            display_name: "Grace L.".to_string(),
            status: MemberStatus::Active,
            zone: None,
        })
        .unwrap();

    let memberships = SqliteMembershipRepository::try_new(&conn).unwrap();
    let service = ReconcileService::new(memberships).with_directory(&members);
    let absentees = service.compute_absentees(group.id, date("2026-03-01"), &[], None);

    assert_eq!(absentees.len(), 1);
    assert_eq!(absentees[0].display_name.as_deref(), Some("Grace L."));
}
