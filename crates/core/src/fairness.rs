//! Workload state and fairness scoring.
//!
//! Each employee accumulates an in-run [`WorkloadState`]: every assignment
//! (including frozen manual edits folded in at the start of a regeneration)
//! is recorded as a mark. The scorer turns those marks into a decayed load
//! and combines it with shift-type weights and soft employee biases; lower
//! score wins the slot. Ties break through a permutation of the roster
//! drawn from the run's seed, so equal-seed runs are identical.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::expansion::SlotDraft;
use crate::roster::Employee;
use crate::template::PreferenceRules;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Workload state
// ---------------------------------------------------------------------------

/// One recorded assignment for rest/overlap checks and decayed load.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentMark {
    pub date: NaiveDate,
    pub shift_type: String,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
}

/// Per-run, per-employee accumulator. Created fresh at run start (seeded
/// from frozen prior assignments when regenerating) and discarded after.
#[derive(Debug, Clone, Default)]
pub struct WorkloadState {
    marks: Vec<AssignmentMark>,
    days: BTreeSet<NaiveDate>,
}

impl WorkloadState {
    pub fn record(&mut self, mark: AssignmentMark) {
        self.days.insert(mark.date);
        self.marks.push(mark);
    }

    pub fn marks(&self) -> &[AssignmentMark] {
        &self.marks
    }

    /// Whether any recorded assignment overlaps `[starts_at, ends_at)`.
    pub fn overlaps(&self, starts_at: Timestamp, ends_at: Timestamp) -> bool {
        self.marks
            .iter()
            .any(|m| m.starts_at < ends_at && starts_at < m.ends_at)
    }

    /// Whether adding a slot with this window keeps the minimum rest gap
    /// against every recorded assignment. Overlapping windows are rejected
    /// by [`Self::overlaps`] before this check applies.
    pub fn rest_gap_ok(
        &self,
        starts_at: Timestamp,
        ends_at: Timestamp,
        min_rest_hours: f64,
    ) -> bool {
        let min_gap_secs = (min_rest_hours * 3600.0).round() as i64;
        self.marks.iter().all(|m| {
            let gap_secs = if m.ends_at <= starts_at {
                (starts_at - m.ends_at).num_seconds()
            } else if ends_at <= m.starts_at {
                (m.starts_at - ends_at).num_seconds()
            } else {
                // Overlap; no gap at all.
                return false;
            };
            gap_secs >= min_gap_secs
        })
    }

    /// Length of the consecutive-working-day run that would result from
    /// adding an assignment on `date`.
    pub fn consecutive_days_with(&self, date: NaiveDate) -> u32 {
        let mut run = 1u32;
        let mut cursor = date;
        while let Some(prev) = cursor.pred_opt() {
            if !self.days.contains(&prev) {
                break;
            }
            run += 1;
            cursor = prev;
        }
        let mut cursor = date;
        while let Some(next) = cursor.succ_opt() {
            if !self.days.contains(&next) {
                break;
            }
            run += 1;
            cursor = next;
        }
        run
    }

    /// Decayed workload as seen from `on_date`.
    ///
    /// Each mark contributes `(1 - decay_rate)^age_days`. Rate 0 reduces to
    /// a plain historical count; rate 1 counts only same-day work.
    pub fn decayed_load(&self, on_date: NaiveDate, decay_rate: f64) -> f64 {
        let retain = 1.0 - decay_rate;
        self.marks
            .iter()
            .map(|m| {
                let age = (on_date - m.date).num_days().unsigned_abs() as i32;
                if age == 0 {
                    1.0
                } else {
                    retain.powi(age)
                }
            })
            .sum()
    }

    /// Number of recorded assignments with the given shift-type tag.
    pub fn count_for_type(&self, shift_type: &str) -> usize {
        self.marks.iter().filter(|m| m.shift_type == shift_type).count()
    }
}

/// Workload states for the whole roster, keyed by employee id.
pub type WorkloadMap = HashMap<DbId, WorkloadState>;

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Ranks eligible candidates for a slot. Constructed once per run.
#[derive(Debug)]
pub struct FairnessScorer {
    decay_rate: f64,
    /// Run-level weight overrides merged over template preference weights.
    weights: HashMap<String, f64>,
    /// (employee, shift_type) -> soft bias multiplier.
    biases: HashMap<(DbId, String), f64>,
    /// Seeded tie-break rank per employee; lower rank wins ties.
    tie_break: HashMap<DbId, usize>,
}

impl FairnessScorer {
    /// Build a scorer from the template preferences, run-level weight
    /// overrides, and the run seed.
    pub fn new(
        employees: &[Employee],
        preferences: &PreferenceRules,
        weight_overrides: &HashMap<String, f64>,
        decay_rate: f64,
        seed: u64,
    ) -> Self {
        let mut weights = preferences.shift_type_weights.clone();
        for (tag, weight) in weight_overrides {
            weights.insert(tag.clone(), *weight);
        }

        let biases = preferences
            .employee_biases
            .iter()
            .map(|b| ((b.employee_id, b.shift_type.clone()), b.bias))
            .collect();

        // Stable seeded permutation of the roster; ordering by id first
        // makes the shuffle independent of input order.
        let mut ids: Vec<DbId> = employees.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        let mut rng = StdRng::seed_from_u64(seed);
        ids.shuffle(&mut rng);
        let tie_break = ids.into_iter().enumerate().map(|(i, id)| (id, i)).collect();

        Self {
            decay_rate,
            weights,
            biases,
            tie_break,
        }
    }

    /// Effective weight for a slot's shift type: run override, then template
    /// preference, then the shift definition's own weight.
    fn weight_for(&self, slot: &SlotDraft) -> f64 {
        self.weights.get(&slot.shift_type).copied().unwrap_or(slot.weight)
    }

    /// Score one candidate for one slot. Lower is better.
    ///
    /// `weight x bias x (1 + decayed load)`: the `1 +` keeps weights and
    /// biases meaningful for employees with no recorded work yet.
    pub fn score(&self, employee_id: DbId, slot: &SlotDraft, workload: &WorkloadState) -> f64 {
        let bias = self
            .biases
            .get(&(employee_id, slot.shift_type.clone()))
            .copied()
            .unwrap_or(1.0);
        self.weight_for(slot) * bias * (1.0 + workload.decayed_load(slot.date, self.decay_rate))
    }

    /// Pick the best candidate: minimum score, ties broken by the seeded
    /// roster permutation.
    pub fn pick(
        &self,
        candidates: &[DbId],
        slot: &SlotDraft,
        workload: &WorkloadMap,
    ) -> Option<DbId> {
        candidates
            .iter()
            .min_by(|a, b| {
                let sa = self.score(**a, slot, workload.get(*a).unwrap_or(&EMPTY));
                let sb = self.score(**b, slot, workload.get(*b).unwrap_or(&EMPTY));
                sa.partial_cmp(&sb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| self.rank(**a).cmp(&self.rank(**b)))
            })
            .copied()
    }

    fn rank(&self, employee_id: DbId) -> usize {
        self.tie_break.get(&employee_id).copied().unwrap_or(usize::MAX)
    }
}

static EMPTY: WorkloadState = WorkloadState {
    marks: Vec::new(),
    days: BTreeSet::new(),
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn mark(d: u32, shift_type: &str) -> AssignmentMark {
        AssignmentMark {
            date: date(d),
            shift_type: shift_type.into(),
            starts_at: Utc.with_ymd_and_hms(2025, 6, d, 8, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2025, 6, d, 16, 0, 0).unwrap(),
        }
    }

    fn slot(d: u32, shift_type: &str) -> SlotDraft {
        SlotDraft {
            position: 0,
            date: date(d),
            starts_at: Utc.with_ymd_and_hms(2025, 6, d, 8, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2025, 6, d, 16, 0, 0).unwrap(),
            shift_type: shift_type.into(),
            required_tags: vec![],
            weight: 1.0,
        }
    }

    fn employees(n: usize) -> Vec<Employee> {
        (1..=n as DbId)
            .map(|id| Employee {
                id,
                name: format!("e{id}"),
                tags: vec![],
                active_from: date(1),
                active_until: None,
            })
            .collect()
    }

    // -- WorkloadState --

    #[test]
    fn overlap_detection() {
        let mut w = WorkloadState::default();
        w.record(mark(2, "day"));
        assert!(w.overlaps(
            Utc.with_ymd_and_hms(2025, 6, 2, 15, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 2, 23, 0, 0).unwrap(),
        ));
        // Touching windows do not overlap.
        assert!(!w.overlaps(
            Utc.with_ymd_and_hms(2025, 6, 2, 16, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 2, 23, 0, 0).unwrap(),
        ));
    }

    #[test]
    fn rest_gap_enforced_in_both_directions() {
        let mut w = WorkloadState::default();
        w.record(mark(2, "day")); // ends 16:00

        // 12h after the end: ok for min 12.
        assert!(w.rest_gap_ok(
            Utc.with_ymd_and_hms(2025, 6, 3, 4, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 3, 12, 0, 0).unwrap(),
            12.0,
        ));
        // Only 8h after the end: violates min 12.
        assert!(!w.rest_gap_ok(
            Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 3, 8, 0, 0).unwrap(),
            12.0,
        ));
        // Earlier slot ending only 4h before the existing start (08:00).
        assert!(!w.rest_gap_ok(
            Utc.with_ymd_and_hms(2025, 6, 1, 20, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 2, 4, 0, 0).unwrap(),
            12.0,
        ));
    }

    #[test]
    fn consecutive_day_run_counts_both_sides() {
        let mut w = WorkloadState::default();
        w.record(mark(2, "day"));
        w.record(mark(3, "day"));
        w.record(mark(5, "day"));
        // Adding day 4 bridges 2-3 and 5 into a 4-day run.
        assert_eq!(w.consecutive_days_with(date(4)), 4);
        // Adding day 7 starts a fresh run next to day 5... day 6 is free.
        assert_eq!(w.consecutive_days_with(date(7)), 1);
    }

    #[test]
    fn decay_zero_is_pure_count() {
        let mut w = WorkloadState::default();
        w.record(mark(1, "day"));
        w.record(mark(2, "day"));
        w.record(mark(3, "day"));
        assert!((w.decayed_load(date(10), 0.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn decay_one_counts_only_same_day() {
        let mut w = WorkloadState::default();
        w.record(mark(1, "day"));
        w.record(mark(9, "day"));
        w.record(mark(10, "day"));
        assert!((w.decayed_load(date(10), 1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn decay_halves_per_day_at_rate_half() {
        let mut w = WorkloadState::default();
        w.record(mark(8, "day"));
        // Two days old at rate 0.5: contributes 0.25.
        assert!((w.decayed_load(date(10), 0.5) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn count_for_type_filters() {
        let mut w = WorkloadState::default();
        w.record(mark(1, "day"));
        w.record(mark(2, "night"));
        w.record(mark(3, "night"));
        assert_eq!(w.count_for_type("night"), 2);
        assert_eq!(w.count_for_type("day"), 1);
        assert_eq!(w.count_for_type("late"), 0);
    }

    // -- FairnessScorer --

    #[test]
    fn lower_load_wins() {
        let roster = employees(2);
        let scorer = FairnessScorer::new(&roster, &PreferenceRules::default(), &HashMap::new(), 0.0, 7);

        let mut workload = WorkloadMap::new();
        let mut busy = WorkloadState::default();
        busy.record(mark(1, "day"));
        workload.insert(1, busy);
        workload.insert(2, WorkloadState::default());

        assert_eq!(scorer.pick(&[1, 2], &slot(2, "day"), &workload), Some(2));
    }

    #[test]
    fn tie_break_is_seed_stable() {
        let roster = employees(5);
        let ids: Vec<DbId> = roster.iter().map(|e| e.id).collect();
        let workload = WorkloadMap::new();

        let a = FairnessScorer::new(&roster, &PreferenceRules::default(), &HashMap::new(), 0.0, 42);
        let b = FairnessScorer::new(&roster, &PreferenceRules::default(), &HashMap::new(), 0.0, 42);
        assert_eq!(
            a.pick(&ids, &slot(1, "day"), &workload),
            b.pick(&ids, &slot(1, "day"), &workload)
        );
    }

    #[test]
    fn tie_break_independent_of_candidate_order() {
        let roster = employees(5);
        let workload = WorkloadMap::new();
        let scorer = FairnessScorer::new(&roster, &PreferenceRules::default(), &HashMap::new(), 0.0, 42);

        let forward: Vec<DbId> = vec![1, 2, 3, 4, 5];
        let reverse: Vec<DbId> = vec![5, 4, 3, 2, 1];
        assert_eq!(
            scorer.pick(&forward, &slot(1, "day"), &workload),
            scorer.pick(&reverse, &slot(1, "day"), &workload)
        );
    }

    #[test]
    fn run_override_beats_template_weight() {
        let roster = employees(1);
        let mut prefs = PreferenceRules::default();
        prefs.shift_type_weights.insert("night".into(), 2.0);
        let mut overrides = HashMap::new();
        overrides.insert("night".into(), 5.0);

        let scorer = FairnessScorer::new(&roster, &prefs, &overrides, 0.0, 0);
        let s = scorer.score(1, &slot(1, "night"), &WorkloadState::default());
        assert!((s - 5.0).abs() < 1e-9);
    }

    #[test]
    fn definition_weight_is_fallback() {
        let roster = employees(1);
        let scorer =
            FairnessScorer::new(&roster, &PreferenceRules::default(), &HashMap::new(), 0.0, 0);
        let mut s = slot(1, "night");
        s.weight = 3.0;
        assert!((scorer.score(1, &s, &WorkloadState::default()) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn employee_bias_applies_to_matching_shift_type_only() {
        let roster = employees(2);
        let prefs = PreferenceRules {
            shift_type_weights: HashMap::new(),
            employee_biases: vec![crate::template::EmployeeBias {
                employee_id: 1,
                shift_type: "night".into(),
                bias: 0.5,
            }],
        };
        let scorer = FairnessScorer::new(&roster, &prefs, &HashMap::new(), 0.0, 0);

        let night = scorer.score(1, &slot(1, "night"), &WorkloadState::default());
        let day = scorer.score(1, &slot(1, "day"), &WorkloadState::default());
        assert!((night - 0.5).abs() < 1e-9);
        assert!((day - 1.0).abs() < 1e-9);
    }
}
