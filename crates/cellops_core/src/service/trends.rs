//! Church-wide weekly standings and leaderboards.
//!
//! # Responsibility
//! - Surface per-week attendance extremes and date-range leaderboards over
//!   non-deleted reports.
//!
//! # Invariants
//! - Ties break deterministically by ascending cell group id.
//! - A week with no reports yields `None`, never a zeroed placeholder.

use crate::model::ChurchId;
use crate::repo::report_repo::{
    LeaderboardMetric, LeaderboardRow, ReportRepository, WeekStanding,
};
use crate::repo::RepoResult;
use chrono::NaiveDate;
use log::info;
use serde::Serialize;

/// One leaderboard per tracked metric, each sorted descending by total.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Leaderboards {
    pub attendance: Vec<LeaderboardRow>,
    pub visitors: Vec<LeaderboardRow>,
    pub absentees: Vec<LeaderboardRow>,
    pub souls: Vec<LeaderboardRow>,
}

/// Trend aggregation service over report storage.
pub struct TrendService<R: ReportRepository> {
    reports: R,
}

impl<R: ReportRepository> TrendService<R> {
    pub fn new(reports: R) -> Self {
        Self { reports }
    }

    /// Highest-attendance group for the meeting date, if any reported.
    pub fn top_cell_for_week(
        &self,
        church_id: ChurchId,
        date: NaiveDate,
    ) -> RepoResult<Option<WeekStanding>> {
        self.reports.week_top(church_id, date)
    }

    /// Lowest-attendance group for the meeting date, if any reported.
    pub fn bottom_cell_for_week(
        &self,
        church_id: ChurchId,
        date: NaiveDate,
    ) -> RepoResult<Option<WeekStanding>> {
        self.reports.week_bottom(church_id, date)
    }

    /// Per-group totals over `[start, end]` for all four metrics, each
    /// truncated to `limit` rows.
    pub fn leaderboards(
        &self,
        church_id: ChurchId,
        start: NaiveDate,
        end: NaiveDate,
        limit: u32,
    ) -> RepoResult<Leaderboards> {
        let boards = Leaderboards {
            attendance: self.reports.leaderboard(
                church_id,
                start,
                end,
                LeaderboardMetric::Attendance,
                limit,
            )?,
            visitors: self.reports.leaderboard(
                church_id,
                start,
                end,
                LeaderboardMetric::Visitors,
                limit,
            )?,
            absentees: self.reports.leaderboard(
                church_id,
                start,
                end,
                LeaderboardMetric::Absentees,
                limit,
            )?,
            souls: self
                .reports
                .leaderboard(church_id, start, end, LeaderboardMetric::Souls, limit)?,
        };
        info!(
            "event=leaderboards module=trends status=ok church={church_id} start={start} end={end} limit={limit}"
        );
        Ok(boards)
    }
}
