//! Domain model for cell-group attendance and health scoring.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own the pure normalization rules for heterogeneous caller input.
//!
//! # Invariants
//! - Every domain object is identified by a stable UUID-backed id alias.
//! - Report deletion is represented by soft-delete tombstones, not hard delete.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

pub mod member;
pub mod report;
pub mod score;

/// Stable identifier for a church tenant.
pub type ChurchId = Uuid;
/// Stable identifier for a cell group.
pub type CellGroupId = Uuid;
/// Stable identifier for a member.
pub type MemberId = Uuid;
/// Stable identifier for a meeting report.
pub type ReportId = Uuid;
/// Stable identifier for a first-time visitor.
pub type VisitorId = Uuid;

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_ms_now() -> i64 {
    Utc::now().timestamp_millis()
}

/// Midnight UTC of the given calendar date, in epoch milliseconds.
///
/// Used to back-fill entry timestamps from roster join dates.
pub fn date_start_epoch_ms(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis()
}
