//! Meeting report domain model and input normalization.
//!
//! # Responsibility
//! - Define the canonical per-meeting record and its three ordered collections.
//! - Normalize heterogeneous caller shapes (bare ids or partial objects) into
//!   canonical entries at every write path.
//!
//! # Invariants
//! - Derived counters always equal the corresponding collection lengths.
//! - No member appears twice in `attendees`; no member/visitor id appears
//!   twice in `absentees`; absentees are disjoint from attendees.
//! - An absentee entry names exactly one of `member_id` / `visitor_id`.
//! - Caller-provided counters are never trusted.

use crate::model::{CellGroupId, ChurchId, MemberId, ReportId, VisitorId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Reason attached to absentees projected by reconciliation.
pub const EXPECTED_REASON: &str = "expected";

/// Canonical attendee entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeEntry {
    pub member_id: MemberId,
    /// Epoch milliseconds; sourced from the roster join date when known.
    pub joined_at: i64,
}

/// Canonical visitor entry. `visitor_id` is absent for unregistered walk-ins
/// recorded by name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorEntry {
    pub visitor_id: Option<VisitorId>,
    pub name: Option<String>,
    pub followup_action: Option<String>,
    pub created_at: i64,
}

/// Canonical absentee entry; exactly one of `member_id` / `visitor_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenteeEntry {
    pub member_id: Option<MemberId>,
    pub visitor_id: Option<VisitorId>,
    pub reason: String,
    pub followup_action: Option<String>,
    pub created_at: i64,
}

impl AbsenteeEntry {
    pub fn validate(&self) -> Result<(), ReportValidationError> {
        match (self.member_id, self.visitor_id) {
            (Some(_), Some(_)) => Err(ReportValidationError::AmbiguousAbsenteeSubject),
            (None, None) => Err(ReportValidationError::MissingAbsenteeSubject),
            _ => Ok(()),
        }
    }
}

/// Validation failures for report creation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportValidationError {
    MissingChurchId,
    MissingCellGroupId,
    MissingMeetingDate,
    MissingAbsenteeSubject,
    AmbiguousAbsenteeSubject,
}

impl Display for ReportValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingChurchId => write!(f, "church_id is required"),
            Self::MissingCellGroupId => write!(f, "cell_group_id is required"),
            Self::MissingMeetingDate => write!(f, "meeting_date is required"),
            Self::MissingAbsenteeSubject => {
                write!(f, "absentee entry must name a member_id or visitor_id")
            }
            Self::AmbiguousAbsenteeSubject => {
                write!(f, "absentee entry must name only one of member_id, visitor_id")
            }
        }
    }
}

impl Error for ReportValidationError {}

/// Attendee input shape accepted from callers: a bare member id or a partial
/// object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AttendeeInput {
    Id(MemberId),
    Entry {
        member_id: MemberId,
        #[serde(default)]
        joined_at: Option<i64>,
    },
}

/// Visitor input shape accepted from callers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VisitorInput {
    Id(VisitorId),
    Entry {
        #[serde(default)]
        visitor_id: Option<VisitorId>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        followup_action: Option<String>,
        #[serde(default)]
        created_at: Option<i64>,
    },
}

/// Absentee input shape accepted from callers; a bare id is read as a member
/// absentee.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AbsenteeInput {
    Id(MemberId),
    Entry {
        #[serde(default)]
        member_id: Option<MemberId>,
        #[serde(default)]
        visitor_id: Option<VisitorId>,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        followup_action: Option<String>,
        #[serde(default)]
        created_at: Option<i64>,
    },
}

/// Untrusted report creation payload as received from API callers.
///
/// All identifying fields are optional here; [`ReportDraft::normalize`] is the
/// single gate converting this shape into a validated [`NewMeetingReport`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportDraft {
    #[serde(default)]
    pub church_id: Option<ChurchId>,
    #[serde(default)]
    pub cell_group_id: Option<CellGroupId>,
    #[serde(default)]
    pub meeting_date: Option<NaiveDate>,
    #[serde(default)]
    pub attendees: Vec<AttendeeInput>,
    #[serde(default)]
    pub visitors: Vec<VisitorInput>,
    #[serde(default)]
    pub absentees: Vec<AbsenteeInput>,
    #[serde(default)]
    pub souls_recorded: Option<u32>,
}

/// Validated, canonical report creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMeetingReport {
    pub church_id: ChurchId,
    pub cell_group_id: CellGroupId,
    pub meeting_date: NaiveDate,
    pub attendees: Vec<AttendeeEntry>,
    pub visitors: Vec<VisitorEntry>,
    pub absentees: Vec<AbsenteeEntry>,
    pub souls_recorded: u32,
}

impl ReportDraft {
    /// Normalizes a caller draft into a canonical creation request.
    ///
    /// # Contract
    /// - Missing `church_id`/`cell_group_id`/`meeting_date` fail validation.
    /// - Collections are deduplicated first-occurrence-wins.
    /// - Absentees duplicating an attendee's member id are dropped, keeping
    ///   the disjointness invariant at the source.
    /// - Missing timestamps default to `now_ms`; missing absentee reasons
    ///   default to [`EXPECTED_REASON`].
    pub fn normalize(self, now_ms: i64) -> Result<NewMeetingReport, ReportValidationError> {
        self.normalize_with(now_ms, |_| None)
    }

    /// Like [`ReportDraft::normalize`], sourcing missing member timestamps
    /// from `roster_join_ms` (roster join date) before falling back to
    /// `now_ms`.
    pub fn normalize_with<F>(
        self,
        now_ms: i64,
        roster_join_ms: F,
    ) -> Result<NewMeetingReport, ReportValidationError>
    where
        F: Fn(MemberId) -> Option<i64>,
    {
        let church_id = self.church_id.ok_or(ReportValidationError::MissingChurchId)?;
        let cell_group_id = self
            .cell_group_id
            .ok_or(ReportValidationError::MissingCellGroupId)?;
        let meeting_date = self
            .meeting_date
            .ok_or(ReportValidationError::MissingMeetingDate)?;

        let attendees = normalize_attendees_with(&self.attendees, now_ms, &roster_join_ms);
        let attendee_ids: BTreeSet<MemberId> =
            attendees.iter().map(|entry| entry.member_id).collect();
        let visitors = normalize_visitors(&self.visitors, now_ms);
        let absentees =
            normalize_absentees_with(&self.absentees, &attendee_ids, now_ms, &roster_join_ms)?;

        Ok(NewMeetingReport {
            church_id,
            cell_group_id,
            meeting_date,
            attendees,
            visitors,
            absentees,
            souls_recorded: self.souls_recorded.unwrap_or(0),
        })
    }
}

/// Canonical per-meeting record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingReport {
    pub id: ReportId,
    pub church_id: ChurchId,
    pub cell_group_id: CellGroupId,
    pub meeting_date: NaiveDate,
    pub attendees: Vec<AttendeeEntry>,
    pub visitors: Vec<VisitorEntry>,
    pub absentees: Vec<AbsenteeEntry>,
    pub attendance_count: usize,
    pub visitors_count: usize,
    pub absentees_count: usize,
    pub souls_recorded: u32,
    pub is_deleted: bool,
    pub deleted_at: Option<i64>,
    pub deleted_by: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MeetingReport {
    /// Whether this report should be considered visible/active.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Standing invariant: counters mirror collection lengths.
    pub fn counters_consistent(&self) -> bool {
        self.attendance_count == self.attendees.len()
            && self.visitors_count == self.visitors.len()
            && self.absentees_count == self.absentees.len()
    }
}

/// Maps any accepted attendee input shape to canonical entries, deduplicated
/// by member id (first occurrence wins).
pub fn normalize_attendees(inputs: &[AttendeeInput], now_ms: i64) -> Vec<AttendeeEntry> {
    normalize_attendees_with(inputs, now_ms, &|_| None)
}

/// [`normalize_attendees`] with a roster-join-date source for missing
/// `joined_at` timestamps.
pub fn normalize_attendees_with<F>(
    inputs: &[AttendeeInput],
    now_ms: i64,
    roster_join_ms: &F,
) -> Vec<AttendeeEntry>
where
    F: Fn(MemberId) -> Option<i64>,
{
    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    for input in inputs {
        let entry = match input {
            AttendeeInput::Id(member_id) => AttendeeEntry {
                member_id: *member_id,
                joined_at: roster_join_ms(*member_id).unwrap_or(now_ms),
            },
            AttendeeInput::Entry {
                member_id,
                joined_at,
            } => AttendeeEntry {
                member_id: *member_id,
                joined_at: joined_at
                    .or_else(|| roster_join_ms(*member_id))
                    .unwrap_or(now_ms),
            },
        };
        if seen.insert(entry.member_id) {
            entries.push(entry);
        }
    }
    entries
}

/// Maps any accepted visitor input shape to canonical entries. Entries with a
/// visitor id are deduplicated by it; name-only walk-ins are kept as given.
pub fn normalize_visitors(inputs: &[VisitorInput], now_ms: i64) -> Vec<VisitorEntry> {
    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    for input in inputs {
        let entry = match input {
            VisitorInput::Id(visitor_id) => VisitorEntry {
                visitor_id: Some(*visitor_id),
                name: None,
                followup_action: None,
                created_at: now_ms,
            },
            VisitorInput::Entry {
                visitor_id,
                name,
                followup_action,
                created_at,
            } => VisitorEntry {
                visitor_id: *visitor_id,
                name: name.clone(),
                followup_action: followup_action.clone(),
                created_at: created_at.unwrap_or(now_ms),
            },
        };
        if let Some(id) = entry.visitor_id {
            if !seen.insert(id) {
                continue;
            }
        }
        entries.push(entry);
    }
    entries
}

/// Maps any accepted absentee input shape to canonical entries.
///
/// Deduplicates by subject id (first occurrence wins) and drops member
/// absentees already present in `attendee_ids`.
pub fn normalize_absentees(
    inputs: &[AbsenteeInput],
    attendee_ids: &BTreeSet<MemberId>,
    now_ms: i64,
) -> Result<Vec<AbsenteeEntry>, ReportValidationError> {
    normalize_absentees_with(inputs, attendee_ids, now_ms, &|_| None)
}

/// [`normalize_absentees`] with a roster-join-date source back-filling
/// `created_at` for member absentees lacking an explicit timestamp.
pub fn normalize_absentees_with<F>(
    inputs: &[AbsenteeInput],
    attendee_ids: &BTreeSet<MemberId>,
    now_ms: i64,
    roster_join_ms: &F,
) -> Result<Vec<AbsenteeEntry>, ReportValidationError>
where
    F: Fn(MemberId) -> Option<i64>,
{
    let mut seen_members = BTreeSet::new();
    let mut seen_visitors = BTreeSet::new();
    let mut entries = Vec::new();
    for input in inputs {
        let entry = match input {
            AbsenteeInput::Id(member_id) => AbsenteeEntry {
                member_id: Some(*member_id),
                visitor_id: None,
                reason: EXPECTED_REASON.to_string(),
                followup_action: None,
                created_at: roster_join_ms(*member_id).unwrap_or(now_ms),
            },
            AbsenteeInput::Entry {
                member_id,
                visitor_id,
                reason,
                followup_action,
                created_at,
            } => AbsenteeEntry {
                member_id: *member_id,
                visitor_id: *visitor_id,
                reason: reason
                    .clone()
                    .unwrap_or_else(|| EXPECTED_REASON.to_string()),
                followup_action: followup_action.clone(),
                created_at: created_at
                    .or_else(|| member_id.and_then(&roster_join_ms))
                    .unwrap_or(now_ms),
            },
        };
        entry.validate()?;

        if let Some(member_id) = entry.member_id {
            if attendee_ids.contains(&member_id) || !seen_members.insert(member_id) {
                continue;
            }
        }
        if let Some(visitor_id) = entry.visitor_id {
            if !seen_visitors.insert(visitor_id) {
                continue;
            }
        }
        entries.push(entry);
    }
    Ok(entries)
}
