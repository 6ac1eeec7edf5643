//! Member, cell group, roster-edge and leave domain types.
//!
//! # Responsibility
//! - Define the member directory record and the roster/leave interval shapes.
//! - Define the cell group record that reports and rosters hang off.
//! - Provide the date predicates used by roster resolution and reconciliation.
//!
//! # Invariants
//! - Members are owned by an external directory; core never deletes them.
//! - A membership is closed via `removed_on`, preserving attendance history.
//! - Leave intervals are inclusive on both ends.

use crate::model::{CellGroupId, ChurchId, MemberId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A small recurring fellowship group within a church.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellGroup {
    pub id: CellGroupId,
    pub church_id: ChurchId,
    pub name: String,
    pub is_active: bool,
}

impl CellGroup {
    pub fn new(church_id: ChurchId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            church_id,
            name: name.into(),
            is_active: true,
        }
    }
}

/// Directory status for a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Inactive,
}

/// Read-only member directory record used for display-name enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub display_name: String,
    pub status: MemberStatus,
    /// Optional pastoral zone label.
    pub zone: Option<String>,
}

/// One roster edge between a member and a cell group.
///
/// Multiple historical memberships may exist per member/group pair; only the
/// most recent open one is authoritative going forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRow {
    pub cell_group_id: CellGroupId,
    pub member_id: MemberId,
    pub role: String,
    pub assigned_on: NaiveDate,
    pub removed_on: Option<NaiveDate>,
}

impl MembershipRow {
    /// Open-interval roster predicate: assigned on or before `date`, and not
    /// yet removed, or removed strictly after `date`.
    pub fn on_roster_as_of(&self, date: NaiveDate) -> bool {
        self.assigned_on <= date && self.removed_on.map_or(true, |removed| removed > date)
    }
}

/// A registered leave of absence excusing a member from attendance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leave {
    pub member_id: MemberId,
    pub start_on: NaiveDate,
    pub end_on: NaiveDate,
}

impl Leave {
    /// Whether this leave excuses the member anywhere inside `[from, until]`.
    pub fn overlaps(&self, from: NaiveDate, until: NaiveDate) -> bool {
        self.start_on <= until && self.end_on >= from
    }
}
