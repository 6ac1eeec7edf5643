//! Attendance reconciliation use-case.
//!
//! # Responsibility
//! - Project the absentee set for a meeting before a report is persisted:
//!   roster minus attendees minus excused members.
//!
//! # Invariants
//! - Roster and leave adapter failures degrade to empty sets (log-and-continue);
//!   reconciliation itself never fails.
//! - Projected entries carry `reason = "expected"` and are distinct from the
//!   operator-maintained absentee collection on a persisted report.
//! - Output order is deterministic: member id ascending.

use crate::model::report::EXPECTED_REASON;
use crate::model::{CellGroupId, MemberId};
use crate::repo::leave_repo::LeaveSource;
use crate::repo::member_repo::MemberDirectory;
use crate::repo::membership_repo::RosterSource;
use chrono::NaiveDate;
use log::warn;
use serde::Serialize;
use std::collections::BTreeSet;

/// Absentee projected by reconciliation, for UI preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectedAbsentee {
    pub member_id: MemberId,
    /// Display-name enrichment; `None` when the directory has no entry or is
    /// unavailable.
    pub display_name: Option<String>,
    pub reason: String,
    /// Marks the entry as projected rather than operator-recorded.
    pub expected: bool,
}

/// Reconciliation service over narrow roster/leave/directory adapters.
///
/// The leave and directory collaborators are optional: reconciliation stays
/// usable when either is absent.
pub struct ReconcileService<'a, R: RosterSource> {
    roster: R,
    leaves: Option<&'a dyn LeaveSource>,
    directory: Option<&'a dyn MemberDirectory>,
}

impl<'a, R: RosterSource> ReconcileService<'a, R> {
    pub fn new(roster: R) -> Self {
        Self {
            roster,
            leaves: None,
            directory: None,
        }
    }

    pub fn with_leave_source(mut self, leaves: &'a dyn LeaveSource) -> Self {
        self.leaves = Some(leaves);
        self
    }

    pub fn with_directory(mut self, directory: &'a dyn MemberDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Computes the projected absentee set for one meeting.
    ///
    /// # Contract
    /// - `absentees = roster(meeting_date) − attendee_ids − on_leave`.
    /// - Leave exclusions cover `[meeting_date, leave_until ?? meeting_date]`.
    /// - Empty roster yields an empty result regardless of attendees.
    pub fn compute_absentees(
        &self,
        cell_group_id: CellGroupId,
        meeting_date: NaiveDate,
        attendee_ids: &[MemberId],
        leave_until: Option<NaiveDate>,
    ) -> Vec<ProjectedAbsentee> {
        let roster: BTreeSet<MemberId> = match self
            .roster
            .list_active_membership(cell_group_id, meeting_date)
        {
            Ok(rows) => rows.into_iter().map(|row| row.member_id).collect(),
            Err(err) => {
                warn!(
                    "event=reconcile_roster_read module=reconcile status=degraded cell_group={cell_group_id} error={err}"
                );
                BTreeSet::new()
            }
        };

        let until = leave_until.unwrap_or(meeting_date);
        let on_leave: BTreeSet<MemberId> = match &self.leaves {
            Some(source) => match source.members_on_leave(meeting_date, until) {
                Ok(excused) => excused,
                Err(err) => {
                    warn!(
                        "event=reconcile_leave_read module=reconcile status=degraded cell_group={cell_group_id} error={err}"
                    );
                    BTreeSet::new()
                }
            },
            None => BTreeSet::new(),
        };

        let attended: BTreeSet<MemberId> = attendee_ids.iter().copied().collect();

        roster
            .into_iter()
            .filter(|member_id| !attended.contains(member_id) && !on_leave.contains(member_id))
            .map(|member_id| ProjectedAbsentee {
                member_id,
                display_name: self.lookup_name(member_id),
                reason: EXPECTED_REASON.to_string(),
                expected: true,
            })
            .collect()
    }

    fn lookup_name(&self, member_id: MemberId) -> Option<String> {
        let directory = self.directory?;
        match directory.display_name(member_id) {
            Ok(name) => name,
            Err(err) => {
                warn!(
                    "event=reconcile_directory_read module=reconcile status=degraded member={member_id} error={err}"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::member::MembershipRow;
    use crate::repo::{RepoError, RepoResult};
    use uuid::Uuid;

    struct FixedRoster(Vec<MembershipRow>);

    impl RosterSource for FixedRoster {
        fn list_active_membership(
            &self,
            _cell_group_id: CellGroupId,
            _as_of: NaiveDate,
        ) -> RepoResult<Vec<MembershipRow>> {
            Ok(self.0.clone())
        }
    }

    struct FailingRoster;

    impl RosterSource for FailingRoster {
        fn list_active_membership(
            &self,
            _cell_group_id: CellGroupId,
            _as_of: NaiveDate,
        ) -> RepoResult<Vec<MembershipRow>> {
            Err(RepoError::InvalidData("roster source offline".to_string()))
        }
    }

    fn roster_row(group: CellGroupId, member: MemberId) -> MembershipRow {
        MembershipRow {
            cell_group_id: group,
            member_id: member,
            role: "member".to_string(),
            assigned_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            removed_on: None,
        }
    }

    #[test]
    fn roster_failure_degrades_to_empty_projection() {
        let service = ReconcileService::new(FailingRoster);
        let result = service.compute_absentees(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            &[],
            None,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn empty_attendees_projects_whole_roster() {
        let group = Uuid::new_v4();
        let members: Vec<MemberId> = (0..3).map(|_| Uuid::new_v4()).collect();
        let rows = members
            .iter()
            .map(|member| roster_row(group, *member))
            .collect();

        let service = ReconcileService::new(FixedRoster(rows));
        let result = service.compute_absentees(
            group,
            NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            &[],
            None,
        );

        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|entry| entry.expected));
        assert!(result.iter().all(|entry| entry.reason == EXPECTED_REASON));
    }
}
