//! Conflict reporting.
//!
//! Unfilled or rule-affected slots are not errors: they come back as
//! structured records with a reason code and enough context for a human to
//! resolve them manually. The collected records are part of the run's
//! telemetry and are persisted with it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Why a slot could not be filled (or why a locked slot is inconsistent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// No employee in the roster passed the hard gates, mixed causes.
    NoCandidates,
    /// Every otherwise-available employee lacks a required tag.
    MissingRequiredTags,
    /// Every otherwise-available employee is on approved leave.
    AllOnLeave,
    /// Candidates existed but assigning any of them would break the
    /// minimum rest gap or the consecutive-day limit.
    RestRuleExhausted,
    /// Candidates existed but all already hold overlapping assignments;
    /// the pool was consumed by earlier slots.
    CapacityExhausted,
    /// A manually locked slot overlaps another assignment held by the
    /// same employee (pre-existing, not corrected).
    LockedOverlap,
    /// A manually locked slot violates the rest rules against another
    /// assignment held by the same employee (pre-existing, not corrected).
    LockedRestViolation,
    /// A manually locked slot carries no occupant; the lock keeps
    /// auto-assignment from filling it.
    LockedUnassigned,
}

impl ConflictReason {
    /// Stable machine-readable code, stored on the slot row.
    pub fn code(self) -> &'static str {
        match self {
            Self::NoCandidates => "no_candidates",
            Self::MissingRequiredTags => "missing_required_tags",
            Self::AllOnLeave => "all_on_leave",
            Self::RestRuleExhausted => "rest_rule_exhausted",
            Self::CapacityExhausted => "capacity_exhausted",
            Self::LockedOverlap => "locked_overlap",
            Self::LockedRestViolation => "locked_rest_violation",
            Self::LockedUnassigned => "locked_unassigned",
        }
    }
}

/// One entry in the run's conflict report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotConflict {
    /// Expansion position of the affected slot.
    pub position: usize,
    pub date: NaiveDate,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub shift_type: String,
    pub reason: ConflictReason,
    /// Human-readable context: which rule, which nearby assignment.
    pub detail: String,
}
