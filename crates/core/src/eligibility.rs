//! Eligibility filtering.
//!
//! The hard gate of the engine: for one slot, the subset of employees that
//! satisfies every hard constraint. No scoring step may override an
//! exclusion made here. Alongside the candidate set the filter returns a
//! tally of why employees were excluded, which the engine uses to attach
//! the most specific reason to unfilled slots.

use crate::conflict::ConflictReason;
use crate::expansion::SlotDraft;
use crate::fairness::WorkloadMap;
use crate::roster::RosterSnapshot;
use crate::template::RestRules;
use crate::types::DbId;

/// Counts of employees excluded per hard gate, in gate order. An employee
/// is counted once, against the first gate that rejected them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExclusionTally {
    pub inactive: u32,
    pub missing_tags: u32,
    pub on_leave: u32,
    pub overlapping: u32,
    pub rest_violation: u32,
    pub consecutive_overrun: u32,
}

impl ExclusionTally {
    /// Total employees excluded by static, roster-level gates.
    fn static_total(&self) -> u32 {
        self.inactive + self.missing_tags + self.on_leave
    }

    /// Derive the most specific conflict reason for an empty candidate set.
    ///
    /// Dynamic exclusions (overlap, rest) mean candidates would have been
    /// available had earlier assignments gone differently, which is more
    /// actionable than a blanket "no candidates".
    pub fn into_reason(self, roster_size: usize) -> ConflictReason {
        if roster_size == 0 {
            return ConflictReason::NoCandidates;
        }
        if self.rest_violation > 0 || self.consecutive_overrun > 0 {
            return ConflictReason::RestRuleExhausted;
        }
        if self.overlapping > 0 {
            return ConflictReason::CapacityExhausted;
        }
        let total = self.static_total();
        if total > 0 && self.missing_tags == total {
            return ConflictReason::MissingRequiredTags;
        }
        if total > 0 && self.on_leave == total {
            return ConflictReason::AllOnLeave;
        }
        ConflictReason::NoCandidates
    }
}

/// Compute the candidates that pass every hard gate for `slot`.
///
/// Gates, in order: active employment on the slot date, required tags,
/// approved-leave overlap, overlapping assignment in this run, minimum rest
/// gap, consecutive-working-day limit. Workload state already includes
/// frozen prior assignments, so regenerated slots respect rest against
/// locked manual edits.
pub fn eligible_candidates(
    slot: &SlotDraft,
    snapshot: &RosterSnapshot,
    rest: &RestRules,
    workload: &WorkloadMap,
) -> (Vec<DbId>, ExclusionTally) {
    let mut candidates = Vec::new();
    let mut tally = ExclusionTally::default();

    for employee in &snapshot.employees {
        if !employee.is_active_on(slot.date) {
            tally.inactive += 1;
            continue;
        }
        if !employee.has_tags(&slot.required_tags) {
            tally.missing_tags += 1;
            continue;
        }
        if snapshot.on_leave_during(employee.id, slot.starts_at, slot.ends_at) {
            tally.on_leave += 1;
            continue;
        }

        if let Some(state) = workload.get(&employee.id) {
            if state.overlaps(slot.starts_at, slot.ends_at) {
                tally.overlapping += 1;
                continue;
            }
            if !state.rest_gap_ok(slot.starts_at, slot.ends_at, rest.min_rest_hours) {
                tally.rest_violation += 1;
                continue;
            }
            if state.consecutive_days_with(slot.date) > rest.max_consecutive_days {
                tally.consecutive_overrun += 1;
                continue;
            }
        }

        candidates.push(employee.id);
    }

    (candidates, tally)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
