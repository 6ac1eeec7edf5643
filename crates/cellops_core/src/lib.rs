//! Core domain logic for cell group attendance tracking and health scoring.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod events;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use events::{EventHubError, ReportEvent, ReportEventHub, ReportEventListener};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::report::{
    AbsenteeEntry, AbsenteeInput, AttendeeEntry, AttendeeInput, MeetingReport, NewMeetingReport,
    ReportDraft, ReportValidationError, VisitorEntry, VisitorInput,
};
pub use model::score::{
    compose_health_score, HealthScoreSnapshot, ScoreComponents, ScoreWeights, ScoringConfig,
};
pub use repo::report_repo::{
    LeaderboardMetric, LeaderboardRow, ReportRepository, SqliteReportRepository, WeekStanding,
};
pub use repo::{RepoError, RepoResult};
pub use service::health::HealthService;
pub use service::reconcile::{ProjectedAbsentee, ReconcileService};
pub use service::report_service::ReportService;
pub use service::trends::{Leaderboards, TrendService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
