//! Health score types and composition.
//!
//! # Responsibility
//! - Define the weighted composite score shape and its default weighting.
//! - Keep score composition a pure function over pre-computed components.
//!
//! # Invariants
//! - Default weights sum to 1.0 and reproduce the documented weighting
//!   exactly; they are injectable configuration, not module state.
//! - `health_score` stays within `[0, 100]` with 2 decimal precision.

use crate::model::CellGroupId;
use serde::{Deserialize, Serialize};

/// Weighting of the five score components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub attendance: f64,
    pub consistency: f64,
    pub growth: f64,
    pub visitors: f64,
    pub recency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            attendance: 0.40,
            consistency: 0.20,
            growth: 0.15,
            visitors: 0.15,
            recency: 0.10,
        }
    }
}

/// Injectable scoring configuration with documented defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    /// Rolling window length; one meeting is expected per week.
    pub window_weeks: u32,
    /// Visitor-count normalization ceiling.
    pub visitor_ceiling: f64,
    /// A group is "recent" when its last report is at most this many days old.
    pub recency_days: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            window_weeks: 6,
            visitor_ceiling: 5.0,
            recency_days: 14,
        }
    }
}

/// Normalized score components, each already clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub attendance_rate: f64,
    pub meeting_consistency: f64,
    pub growth_rate: f64,
    pub avg_visitors: f64,
    /// 1.0 when the group met recently, else 0.0.
    pub recency: f64,
}

/// On-demand composite health snapshot for one cell group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScoreSnapshot {
    pub cell_group_id: CellGroupId,
    pub components: ScoreComponents,
    /// Reports found inside the scoring window.
    pub reports_in_window: usize,
    pub health_score: f64,
}

/// Composes the weighted 0–100 score from normalized components.
pub fn compose_health_score(components: &ScoreComponents, weights: &ScoreWeights) -> f64 {
    let weighted = weights.attendance * components.attendance_rate
        + weights.consistency * components.meeting_consistency
        + weights.growth * components.growth_rate
        + weights.visitors * components.avg_visitors
        + weights.recency * components.recency;
    round2((100.0 * weighted).clamp(0.0, 100.0))
}

/// Clamps a raw ratio into the unit interval, mapping non-finite input to 0.
pub fn unit_clamp(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
