//! On-demand cell group health scoring.
//!
//! # Responsibility
//! - Derive the five normalized score components from stored reports and
//!   roster history, then compose the weighted 0-100 score.
//! - Detect consecutive-absence streaks for follow-up flagging.
//!
//! # Invariants
//! - Scores are computed on demand and never persisted.
//! - Zero-denominator ratios resolve to 0.0 component values, never errors.
//! - A group with zero reports in the window scores exactly 0.0.

use crate::model::report::MeetingReport;
use crate::model::score::{
    compose_health_score, unit_clamp, HealthScoreSnapshot, ScoreComponents, ScoringConfig,
};
use crate::model::{CellGroupId, MemberId};
use crate::repo::membership_repo::MembershipRepository;
use crate::repo::report_repo::ReportRepository;
use crate::repo::RepoResult;
use chrono::{Duration, NaiveDate};
use log::info;

/// Health scoring service over report and membership storage.
pub struct HealthService<R: ReportRepository, M: MembershipRepository> {
    reports: R,
    memberships: M,
    config: ScoringConfig,
}

impl<R: ReportRepository, M: MembershipRepository> HealthService<R, M> {
    pub fn new(reports: R, memberships: M) -> Self {
        Self::with_config(reports, memberships, ScoringConfig::default())
    }

    pub fn with_config(reports: R, memberships: M, config: ScoringConfig) -> Self {
        Self {
            reports,
            memberships,
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Computes the composite health snapshot for one group as of a date.
    ///
    /// The scoring window is the `window_weeks * 7` days ending at `as_of`
    /// (exclusive start, inclusive end). Soft-deleted reports never
    /// contribute.
    pub fn compute_health_score(
        &self,
        cell_group_id: CellGroupId,
        as_of: NaiveDate,
    ) -> RepoResult<HealthScoreSnapshot> {
        let window_start = as_of - Duration::weeks(i64::from(self.config.window_weeks));
        let reports = self
            .reports
            .reports_in_window(cell_group_id, window_start, as_of)?;

        let components = ScoreComponents {
            attendance_rate: self.attendance_rate(cell_group_id, &reports)?,
            meeting_consistency: unit_clamp(
                reports.len() as f64 / f64::from(self.config.window_weeks),
            ),
            growth_rate: self.growth_rate(cell_group_id, window_start, as_of)?,
            avg_visitors: self.avg_visitors(&reports),
            recency: self.recency(cell_group_id, as_of)?,
        };
        let health_score = compose_health_score(&components, &self.config.weights);
        info!(
            "event=health_score module=health status=ok cell_group={cell_group_id} as_of={as_of} reports={} score={health_score}",
            reports.len()
        );

        Ok(HealthScoreSnapshot {
            cell_group_id,
            components,
            reports_in_window: reports.len(),
            health_score,
        })
    }

    /// True when the member appears in the absentee list of every one of the
    /// group's `n` most recent reports, and at least `n` reports exist.
    pub fn is_consecutive_absence(
        &self,
        member_id: MemberId,
        cell_group_id: CellGroupId,
        n: u32,
    ) -> RepoResult<bool> {
        if n == 0 {
            return Ok(false);
        }
        let reports = self.reports.last_reports(cell_group_id, n)?;
        if reports.len() < n as usize {
            return Ok(false);
        }
        Ok(reports.iter().all(|report| {
            report
                .absentees
                .iter()
                .any(|entry| entry.member_id == Some(member_id))
        }))
    }

    fn attendance_rate(
        &self,
        cell_group_id: CellGroupId,
        reports: &[MeetingReport],
    ) -> RepoResult<f64> {
        if reports.is_empty() {
            return Ok(0.0);
        }
        let mut sum = 0.0;
        for report in reports {
            let roster = self
                .memberships
                .roster_size_as_of(cell_group_id, report.meeting_date)?;
            if roster > 0 {
                sum += unit_clamp(report.attendance_count as f64 / roster as f64);
            }
        }
        Ok(sum / reports.len() as f64)
    }

    fn growth_rate(
        &self,
        cell_group_id: CellGroupId,
        window_start: NaiveDate,
        as_of: NaiveDate,
    ) -> RepoResult<f64> {
        let base = self
            .memberships
            .roster_size_as_of(cell_group_id, window_start)?;
        if base == 0 {
            return Ok(0.0);
        }
        let joined = self
            .memberships
            .joins_between(cell_group_id, window_start, as_of)?;
        Ok(unit_clamp(joined as f64 / base as f64))
    }

    fn avg_visitors(&self, reports: &[MeetingReport]) -> f64 {
        if reports.is_empty() || self.config.visitor_ceiling <= 0.0 {
            return 0.0;
        }
        let mean = reports
            .iter()
            .map(|report| report.visitors_count as f64)
            .sum::<f64>()
            / reports.len() as f64;
        unit_clamp(mean / self.config.visitor_ceiling)
    }

    fn recency(&self, cell_group_id: CellGroupId, as_of: NaiveDate) -> RepoResult<f64> {
        let last = self.reports.last_reports(cell_group_id, 1)?;
        let recent = last
            .first()
            .map(|report| (as_of - report.meeting_date).num_days() <= self.config.recency_days)
            .unwrap_or(false);
        Ok(if recent { 1.0 } else { 0.0 })
    }
}
