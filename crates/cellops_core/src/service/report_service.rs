//! Meeting report lifecycle use-case service.
//!
//! # Responsibility
//! - Provide stable create/mutate/read entry points for core callers.
//! - Back-fill member timestamps from roster join dates.
//! - Emit lifecycle events for the external notification fan-out.
//!
//! # Invariants
//! - All caller input passes through model normalization; counters are never
//!   taken from callers.
//! - Event emission is best-effort and never fails the triggering operation.
//! - Roster reads on mutation paths are enrichment only; their failure
//!   degrades to current time and never blocks the write.

use crate::events::{EventHubError, ReportEvent, ReportEventHub, ReportEventListener};
use crate::model::report::{
    normalize_absentees_with, normalize_visitors, AbsenteeInput, MeetingReport, ReportDraft,
    VisitorInput,
};
use crate::model::{date_start_epoch_ms, epoch_ms_now, CellGroupId, MemberId, ReportId};
use crate::repo::membership_repo::MembershipRepository;
use crate::repo::report_repo::ReportRepository;
use crate::repo::{RepoError, RepoResult};
use log::{info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Use-case service wrapper for meeting report operations.
pub struct ReportService<R: ReportRepository, M: MembershipRepository> {
    reports: R,
    memberships: M,
    hub: ReportEventHub,
}

impl<R: ReportRepository, M: MembershipRepository> ReportService<R, M> {
    pub fn new(reports: R, memberships: M) -> Self {
        Self {
            reports,
            memberships,
            hub: ReportEventHub::new(),
        }
    }

    /// Registers an external observer for report lifecycle events.
    pub fn subscribe(
        &mut self,
        subscriber_id: &str,
        listener: Arc<dyn ReportEventListener>,
    ) -> Result<(), EventHubError> {
        self.hub.subscribe(subscriber_id, listener)
    }

    /// Creates one report from an untrusted caller draft.
    ///
    /// # Contract
    /// - Missing required identifiers fail with `RepoError::Validation`.
    /// - Member entries without explicit timestamps get the roster join date,
    ///   else current time.
    pub fn create(&self, draft: ReportDraft) -> RepoResult<MeetingReport> {
        let now = epoch_ms_now();
        let cell_group_id = draft.cell_group_id;
        let new = draft.normalize_with(now, |member_id| {
            cell_group_id.and_then(|group| self.join_date_ms(group, member_id))
        })?;

        let report = self.reports.create(&new)?;
        info!(
            "event=report_created module=report_service status=ok report={} cell_group={} meeting_date={}",
            report.id, report.cell_group_id, report.meeting_date
        );
        self.hub.emit(&ReportEvent::Created {
            report_id: report.id,
            cell_group_id: report.cell_group_id,
            meeting_date: report.meeting_date,
        });
        Ok(report)
    }

    /// Gets one live report by id.
    pub fn get(&self, report_id: ReportId) -> RepoResult<MeetingReport> {
        self.reports
            .get(report_id, false)?
            .ok_or(RepoError::ReportNotFound(report_id))
    }

    /// Appends one attendee; appending a present member is a silent no-op.
    pub fn add_attendee(
        &self,
        report_id: ReportId,
        member_id: MemberId,
    ) -> RepoResult<MeetingReport> {
        let report = self.get(report_id)?;
        let joined_at = self
            .join_date_ms(report.cell_group_id, member_id)
            .unwrap_or_else(epoch_ms_now);
        let updated = self.reports.add_attendee(report_id, member_id, joined_at)?;
        self.emit_updated(&updated);
        Ok(updated)
    }

    /// Removes all entries for `member_id`; removing a non-present member
    /// returns the unchanged report.
    pub fn remove_attendee(
        &self,
        report_id: ReportId,
        member_id: MemberId,
    ) -> RepoResult<MeetingReport> {
        let updated = self.reports.remove_attendee(report_id, member_id)?;
        self.emit_updated(&updated);
        Ok(updated)
    }

    /// Appends one visitor from any accepted input shape.
    pub fn add_visitor(
        &self,
        report_id: ReportId,
        visitor: VisitorInput,
    ) -> RepoResult<MeetingReport> {
        let entries = normalize_visitors(&[visitor], epoch_ms_now());
        let entry = entries
            .first()
            .ok_or_else(|| RepoError::InvalidData("empty visitor input".to_string()))?;
        let updated = self.reports.add_visitor(report_id, entry)?;
        self.emit_updated(&updated);
        Ok(updated)
    }

    /// Appends one absentee from any accepted input shape, back-filling
    /// `created_at` from the roster join date for member absentees.
    pub fn add_absentee(
        &self,
        report_id: ReportId,
        absentee: AbsenteeInput,
    ) -> RepoResult<MeetingReport> {
        let report = self.get(report_id)?;
        let entries = normalize_absentees_with(
            &[absentee],
            &BTreeSet::new(),
            epoch_ms_now(),
            &|member_id| self.join_date_ms(report.cell_group_id, member_id),
        )?;
        let entry = entries
            .first()
            .ok_or_else(|| RepoError::InvalidData("empty absentee input".to_string()))?;
        let updated = self.reports.add_absentee(report_id, entry)?;
        self.emit_updated(&updated);
        Ok(updated)
    }

    /// Soft-deletes one report; hard delete is not supported.
    pub fn soft_delete(&self, report_id: ReportId, actor_id: Uuid) -> RepoResult<()> {
        self.reports.soft_delete(report_id, actor_id)?;
        info!(
            "event=report_deleted module=report_service status=ok report={report_id} actor={actor_id}"
        );
        self.hub.emit(&ReportEvent::Deleted { report_id });
        Ok(())
    }

    fn emit_updated(&self, report: &MeetingReport) {
        self.hub.emit(&ReportEvent::Updated {
            report_id: report.id,
            cell_group_id: report.cell_group_id,
            meeting_date: report.meeting_date,
        });
    }

    fn join_date_ms(&self, cell_group_id: CellGroupId, member_id: MemberId) -> Option<i64> {
        match self.memberships.roster_join_date(cell_group_id, member_id) {
            Ok(date) => date.map(date_start_epoch_ms),
            Err(err) => {
                warn!(
                    "event=roster_join_date_read module=report_service status=degraded member={member_id} error={err}"
                );
                None
            }
        }
    }
}
