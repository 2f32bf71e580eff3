//! The assignment engine.
//!
//! Orders expanded slots by scarcity, assigns the best-scoring eligible
//! candidate per slot, and folds every assignment back into the per-employee
//! workload state so later slots see it. Slots it cannot fill are left
//! unassigned with a structured conflict record; the engine never violates
//! the overlap or rest invariants to fill a slot.
//!
//! Regeneration runs through the same path: manually locked slots from the
//! prior schedule are copied verbatim into the working set first and their
//! occupants seeded into workload state, so auto-assignment respects rest
//! against frozen manual edits.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::conflict::{ConflictReason, SlotConflict};
use crate::eligibility::eligible_candidates;
use crate::error::CoreError;
use crate::expansion::{expand_slots, SlotDraft};
use crate::fairness::{AssignmentMark, FairnessScorer, WorkloadMap};
use crate::roster::RosterSnapshot;
use crate::template::RosterTemplate;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Slot result types
// ---------------------------------------------------------------------------

/// Whether an assignment was produced by the engine or by a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    Auto,
    Manual,
}

impl AssignmentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

/// Assignment status of a resolved slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Assigned,
    Unassigned,
    Conflict,
}

impl SlotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Unassigned => "unassigned",
            Self::Conflict => "conflict",
        }
    }
}

/// A slot from a previously generated schedule, as input to regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorSlot {
    pub date: NaiveDate,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub shift_type: String,
    pub employee_id: Option<DbId>,
    pub manual_lock: bool,
}

/// One fully resolved slot in the engine's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSlot {
    pub draft: SlotDraft,
    pub employee_id: Option<DbId>,
    pub source: AssignmentSource,
    pub manual_lock: bool,
    pub status: SlotStatus,
    pub conflict_reason: Option<ConflictReason>,
}

// ---------------------------------------------------------------------------
// Run options & telemetry
// ---------------------------------------------------------------------------

/// Caller-supplied knobs for one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    /// Seed for deterministic tie-breaking.
    pub seed: u64,
    /// Fairness decay rate in `[0, 1]`. 0 balances on plain historical
    /// counts; 1 considers only same-day workload.
    pub decay_rate: f64,
    /// Keep manually locked slots from the source schedule.
    pub preserve_manual_edits: bool,
    /// Treat locked slots as ordinary slots. Explicit caller choice,
    /// never a default.
    pub overwrite_locked: bool,
    /// Per-shift-type weight overrides, taking precedence over template
    /// preference weights.
    #[serde(default)]
    pub shift_type_weights: HashMap<String, f64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            decay_rate: 0.0,
            preserve_manual_edits: true,
            overwrite_locked: false,
            shift_type_weights: HashMap::new(),
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.decay_rate) || !self.decay_rate.is_finite() {
            return Err(CoreError::Validation(
                "decay_rate must be between 0 and 1".into(),
            ));
        }
        for (tag, weight) in &self.shift_type_weights {
            if !(weight.is_finite() && *weight > 0.0) {
                return Err(CoreError::Validation(format!(
                    "Weight override for '{tag}' must be a positive number"
                )));
            }
        }
        Ok(())
    }
}

/// Run-level counters and the conflict report, persisted as the run's
/// telemetry and returned to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTelemetry {
    pub total_slots: u32,
    pub assigned: u32,
    pub unassigned: u32,
    pub conflict_slots: u32,
    pub locked_preserved: u32,
    /// Positions of slots left unassigned.
    pub unfilled_positions: Vec<usize>,
    pub conflicts: Vec<SlotConflict>,
}

/// The engine's complete output for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutcome {
    pub slots: Vec<ResolvedSlot>,
    pub telemetry: RunTelemetry,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate a roster for `[start, end]`.
///
/// `prior` carries the slots of the schedule being regenerated (empty for a
/// fresh generation). The function is synchronous and performs no I/O;
/// `cancel` is checked between assignments so a long regeneration can be
/// aborted without partial output.
pub fn generate_roster(
    template: &RosterTemplate,
    start: NaiveDate,
    end: NaiveDate,
    snapshot: &RosterSnapshot,
    prior: &[PriorSlot],
    options: &RunOptions,
    cancel: &CancellationToken,
) -> Result<EngineOutcome, CoreError> {
    options.validate()?;
    template.validate()?;

    let drafts = expand_slots(template, start, end, snapshot)?;

    let mut slots: Vec<Option<ResolvedSlot>> = vec![None; drafts.len()];
    let mut drafts = drafts;
    let mut workload: WorkloadMap = WorkloadMap::new();
    let mut conflicts: Vec<SlotConflict> = Vec::new();
    let mut locked_preserved = 0u32;

    // -- Regeneration merge: freeze locked slots before the loop runs. --
    if options.preserve_manual_edits && !options.overwrite_locked {
        freeze_locked_slots(
            prior,
            &mut drafts,
            &mut slots,
            &mut workload,
            &mut conflicts,
            &mut locked_preserved,
        );
        report_frozen_inconsistencies(template, &drafts, &mut slots, &mut conflicts);
    }

    let scorer = FairnessScorer::new(
        &snapshot.employees,
        &template.preference_rules,
        &options.shift_type_weights,
        options.decay_rate,
        options.seed,
    );

    // -- Assignment loop: hardest-to-fill slots first. --
    loop {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        // Eligibility is recomputed every round: each assignment changes
        // the workload state the remaining slots are filtered against.
        let mut best: Option<(usize, Vec<DbId>, crate::eligibility::ExclusionTally)> = None;
        for (i, slot) in slots.iter().enumerate() {
            if slot.is_some() {
                continue;
            }
            let draft = &drafts[i];
            let (candidates, tally) =
                eligible_candidates(draft, snapshot, &template.rest_rules, &workload);
            let better = match &best {
                None => true,
                Some((best_i, best_c, _)) => {
                    let key = (candidates.len(), draft.starts_at, draft.position);
                    let best_key = (
                        best_c.len(),
                        drafts[*best_i].starts_at,
                        drafts[*best_i].position,
                    );
                    key < best_key
                }
            };
            if better {
                best = Some((i, candidates, tally));
            }
        }

        let Some((index, candidates, tally)) = best else {
            break;
        };

        let draft = &drafts[index];
        match scorer.pick(&candidates, draft, &workload) {
            Some(employee_id) => {
                workload.entry(employee_id).or_default().record(AssignmentMark {
                    date: draft.date,
                    shift_type: draft.shift_type.clone(),
                    starts_at: draft.starts_at,
                    ends_at: draft.ends_at,
                });
                slots[index] = Some(ResolvedSlot {
                    draft: draft.clone(),
                    employee_id: Some(employee_id),
                    source: AssignmentSource::Auto,
                    manual_lock: false,
                    status: SlotStatus::Assigned,
                    conflict_reason: None,
                });
            }
            None => {
                let reason = tally.into_reason(snapshot.employees.len());
                conflicts.push(SlotConflict {
                    position: draft.position,
                    date: draft.date,
                    starts_at: draft.starts_at,
                    ends_at: draft.ends_at,
                    shift_type: draft.shift_type.clone(),
                    reason,
                    detail: unfilled_detail(reason, &tally),
                });
                slots[index] = Some(ResolvedSlot {
                    draft: draft.clone(),
                    employee_id: None,
                    source: AssignmentSource::Auto,
                    manual_lock: false,
                    status: SlotStatus::Unassigned,
                    conflict_reason: Some(reason),
                });
            }
        }
    }

    // The loop only exits once every index is resolved.
    let slots: Vec<ResolvedSlot> = slots.into_iter().flatten().collect();

    let mut telemetry = RunTelemetry {
        total_slots: slots.len() as u32,
        locked_preserved,
        conflicts,
        ..RunTelemetry::default()
    };
    for slot in &slots {
        match slot.status {
            SlotStatus::Assigned => telemetry.assigned += 1,
            SlotStatus::Unassigned => {
                telemetry.unassigned += 1;
                telemetry.unfilled_positions.push(slot.draft.position);
            }
            SlotStatus::Conflict => telemetry.conflict_slots += 1,
        }
    }

    Ok(EngineOutcome { slots, telemetry })
}

/// Copy locked prior slots verbatim into the working set and seed their
/// occupants into workload state.
///
/// A locked slot matches the first unconsumed draft with the same date,
/// window, and shift type. Locked slots the new expansion no longer covers
/// are appended so a manual edit is never dropped by a template change.
fn freeze_locked_slots(
    prior: &[PriorSlot],
    drafts: &mut Vec<SlotDraft>,
    slots: &mut Vec<Option<ResolvedSlot>>,
    workload: &mut WorkloadMap,
    conflicts: &mut Vec<SlotConflict>,
    locked_preserved: &mut u32,
) {
    for prior_slot in prior.iter().filter(|p| p.manual_lock) {
        let index = drafts.iter().enumerate().position(|(i, d)| {
            slots[i].is_none()
                && d.date == prior_slot.date
                && d.starts_at == prior_slot.starts_at
                && d.ends_at == prior_slot.ends_at
                && d.shift_type == prior_slot.shift_type
        });

        let index = match index {
            Some(i) => i,
            None => {
                // Carried-over manual edit outside the new expansion.
                drafts.push(SlotDraft {
                    position: drafts.len(),
                    date: prior_slot.date,
                    starts_at: prior_slot.starts_at,
                    ends_at: prior_slot.ends_at,
                    shift_type: prior_slot.shift_type.clone(),
                    required_tags: Vec::new(),
                    weight: 1.0,
                });
                slots.push(None);
                drafts.len() - 1
            }
        };

        // A cleared-but-locked slot stays empty; report it so every
        // non-assigned slot appears in the conflict record.
        let (status, conflict_reason) = if prior_slot.employee_id.is_some() {
            (SlotStatus::Assigned, None)
        } else {
            conflicts.push(SlotConflict {
                position: drafts[index].position,
                date: prior_slot.date,
                starts_at: prior_slot.starts_at,
                ends_at: prior_slot.ends_at,
                shift_type: prior_slot.shift_type.clone(),
                reason: ConflictReason::LockedUnassigned,
                detail: "Locked slot has no occupant; the lock blocks auto-assignment".into(),
            });
            (SlotStatus::Unassigned, Some(ConflictReason::LockedUnassigned))
        };
        slots[index] = Some(ResolvedSlot {
            draft: drafts[index].clone(),
            employee_id: prior_slot.employee_id,
            source: AssignmentSource::Manual,
            manual_lock: true,
            status,
            conflict_reason,
        });
        *locked_preserved += 1;

        if let Some(employee_id) = prior_slot.employee_id {
            workload.entry(employee_id).or_default().record(AssignmentMark {
                date: prior_slot.date,
                shift_type: prior_slot.shift_type.clone(),
                starts_at: prior_slot.starts_at,
                ends_at: prior_slot.ends_at,
            });
        }
    }
}

/// Detect locked slots that conflict with each other (overlap or rest
/// violation for the same employee). Reported as pre-existing conflicts,
/// never silently corrected: the assignment and the lock stay in place.
fn report_frozen_inconsistencies(
    template: &RosterTemplate,
    drafts: &[SlotDraft],
    slots: &mut [Option<ResolvedSlot>],
    conflicts: &mut Vec<SlotConflict>,
) {
    let frozen: Vec<(usize, DbId)> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, s)| {
            s.as_ref()
                .filter(|s| s.manual_lock)
                .and_then(|s| s.employee_id.map(|e| (i, e)))
        })
        .collect();

    let min_gap_secs = (template.rest_rules.min_rest_hours * 3600.0).round() as i64;

    for (a_pos, &(a, employee)) in frozen.iter().enumerate() {
        for &(b, other) in frozen.iter().skip(a_pos + 1) {
            if employee != other {
                continue;
            }
            let (da, db) = (&drafts[a], &drafts[b]);
            let reason = if da.starts_at < db.ends_at && db.starts_at < da.ends_at {
                Some(ConflictReason::LockedOverlap)
            } else {
                let gap = if da.ends_at <= db.starts_at {
                    (db.starts_at - da.ends_at).num_seconds()
                } else {
                    (da.starts_at - db.ends_at).num_seconds()
                };
                (gap < min_gap_secs).then_some(ConflictReason::LockedRestViolation)
            };

            if let Some(reason) = reason {
                let Some(slot) = slots[b].as_mut() else {
                    continue;
                };
                if slot.conflict_reason.is_none() {
                    slot.status = SlotStatus::Conflict;
                    slot.conflict_reason = Some(reason);
                    conflicts.push(SlotConflict {
                        position: db.position,
                        date: db.date,
                        starts_at: db.starts_at,
                        ends_at: db.ends_at,
                        shift_type: db.shift_type.clone(),
                        reason,
                        detail: format!(
                            "Locked slot clashes with locked assignment for employee {employee} \
                             on {} ({} - {})",
                            da.date, da.starts_at, da.ends_at
                        ),
                    });
                }
            }
        }
    }
}

fn unfilled_detail(reason: ConflictReason, tally: &crate::eligibility::ExclusionTally) -> String {
    match reason {
        ConflictReason::MissingRequiredTags => format!(
            "{} employee(s) excluded for missing required tags",
            tally.missing_tags
        ),
        ConflictReason::AllOnLeave => {
            format!("{} employee(s) on approved leave", tally.on_leave)
        }
        ConflictReason::RestRuleExhausted => format!(
            "{} employee(s) blocked by rest rules, {} over the consecutive-day limit",
            tally.rest_violation, tally.consecutive_overrun
        ),
        ConflictReason::CapacityExhausted => format!(
            "{} employee(s) already hold overlapping assignments",
            tally.overlapping
        ),
        _ => "No employee passed the eligibility gates".into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
