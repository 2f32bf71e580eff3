//! Slot expansion.
//!
//! Turns a validated template plus a date range into the flat, stably
//! ordered list of dated slots the engine assigns. One slot per headcount
//! unit per shift occurrence; ordering is (date, plan index, unit) and is
//! fully deterministic so regeneration and seeded tie-breaking are
//! reproducible.

use chrono::{Days, LocalResult, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roster::RosterSnapshot;
use crate::template::{RosterTemplate, MAX_RANGE_DAYS};
use crate::types::Timestamp;

/// One concrete (date, window, shift-type) unit of required coverage.
///
/// `position` is the slot's index in expansion order and doubles as its
/// stable identity within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDraft {
    pub position: usize,
    pub date: NaiveDate,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub shift_type: String,
    /// Merged template-wide and per-definition required tags.
    pub required_tags: Vec<String>,
    /// The shift definition's fallback fairness weight.
    pub weight: f64,
}

/// Expand `template` over the inclusive `[start, end]` date range.
///
/// Holidays in the snapshot suppress only definitions flagged
/// `skip_on_holiday`. Wall-clock times are resolved through the template
/// timezone; midnight-crossing windows end on the following day.
pub fn expand_slots(
    template: &RosterTemplate,
    start: NaiveDate,
    end: NaiveDate,
    snapshot: &RosterSnapshot,
) -> Result<Vec<SlotDraft>, CoreError> {
    if start > end {
        return Err(CoreError::Validation(
            "Range start date must not be after end date".into(),
        ));
    }
    let span_days = (end - start).num_days() + 1;
    if span_days > MAX_RANGE_DAYS {
        return Err(CoreError::Validation(format!(
            "Generation range must not exceed {MAX_RANGE_DAYS} days"
        )));
    }

    let mut slots = Vec::new();
    let mut date = start;
    while date <= end {
        for shift in &template.coverage_plan {
            if !shift.day_pattern.matches(date) {
                continue;
            }
            if shift.skip_on_holiday && snapshot.is_holiday(date) {
                continue;
            }

            let starts_at = resolve_local(template.timezone, date, shift.start_time)?;
            let end_date = if shift.crosses_midnight {
                date.checked_add_days(Days::new(1)).ok_or_else(|| {
                    CoreError::Internal("Date overflow while expanding slots".into())
                })?
            } else {
                date
            };
            let ends_at = resolve_local(template.timezone, end_date, shift.end_time)?;

            for _unit in 0..shift.headcount {
                let mut required_tags = template.constraint_rules.required_tags.clone();
                for tag in &shift.required_tags {
                    if !required_tags.contains(tag) {
                        required_tags.push(tag.clone());
                    }
                }
                slots.push(SlotDraft {
                    position: slots.len(),
                    date,
                    starts_at,
                    ends_at,
                    shift_type: shift.shift_type.clone(),
                    required_tags,
                    weight: shift.weight,
                });
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    Ok(slots)
}

/// Resolve a wall-clock time in `tz` to a UTC instant.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
/// Non-existent local times (DST spring-forward gap) are shifted forward
/// one hour, matching how the surrounding clocks actually behave.
fn resolve_local(tz: Tz, date: NaiveDate, time: NaiveTime) -> Result<Timestamp, CoreError> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&chrono::Utc)),
        LocalResult::Ambiguous(earlier, _later) => Ok(earlier.with_timezone(&chrono::Utc)),
        LocalResult::None => {
            let shifted = naive + chrono::Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                    Ok(dt.with_timezone(&chrono::Utc))
                }
                LocalResult::None => Err(CoreError::Validation(format!(
                    "Local time {naive} does not exist in timezone {tz}"
                ))),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{
        ConstraintRules, DayPattern, PreferenceRules, RestRules, ShiftDefinition,
    };
    use chrono::Weekday;
    use std::collections::BTreeSet;

    fn shift(shift_type: &str, headcount: u32) -> ShiftDefinition {
        ShiftDefinition {
            shift_type: shift_type.into(),
            day_pattern: DayPattern::Daily,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            crosses_midnight: false,
            headcount,
            required_tags: vec![],
            weight: 1.0,
            skip_on_holiday: false,
        }
    }

    fn template(plan: Vec<ShiftDefinition>) -> RosterTemplate {
        RosterTemplate {
            name: "t".into(),
            timezone: chrono_tz::UTC,
            coverage_plan: plan,
            rest_rules: RestRules::default(),
            constraint_rules: ConstraintRules::default(),
            preference_rules: PreferenceRules::default(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn one_slot_per_headcount_unit_per_day() {
        let t = template(vec![shift("day", 2)]);
        let slots =
            expand_slots(&t, date(2025, 6, 2), date(2025, 6, 4), &RosterSnapshot::default())
                .unwrap();
        // 3 days x headcount 2.
        assert_eq!(slots.len(), 6);
        assert_eq!(slots[0].date, date(2025, 6, 2));
        assert_eq!(slots[1].date, date(2025, 6, 2));
        assert_eq!(slots[2].date, date(2025, 6, 3));
    }

    #[test]
    fn positions_are_sequential() {
        let t = template(vec![shift("day", 2), shift("late", 1)]);
        let slots =
            expand_slots(&t, date(2025, 6, 2), date(2025, 6, 3), &RosterSnapshot::default())
                .unwrap();
        let positions: Vec<usize> = slots.iter().map(|s| s.position).collect();
        assert_eq!(positions, (0..slots.len()).collect::<Vec<_>>());
    }

    #[test]
    fn weekly_pattern_skips_other_days() {
        let mut s = shift("day", 1);
        s.day_pattern = DayPattern::Weekly {
            days: vec![Weekday::Mon],
        };
        let t = template(vec![s]);
        // 2025-06-02 is a Monday; range covers two weeks.
        let slots =
            expand_slots(&t, date(2025, 6, 2), date(2025, 6, 15), &RosterSnapshot::default())
                .unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].date, date(2025, 6, 2));
        assert_eq!(slots[1].date, date(2025, 6, 9));
    }

    #[test]
    fn holiday_suppresses_only_flagged_definitions() {
        let mut skipping = shift("day", 1);
        skipping.skip_on_holiday = true;
        let t = template(vec![skipping, shift("late", 1)]);

        let mut holidays = BTreeSet::new();
        holidays.insert(date(2025, 6, 3));
        let snapshot = RosterSnapshot {
            holidays,
            ..RosterSnapshot::default()
        };

        let slots = expand_slots(&t, date(2025, 6, 2), date(2025, 6, 4), &snapshot).unwrap();
        // "day" runs on 2 of 3 days, "late" on all 3.
        assert_eq!(slots.iter().filter(|s| s.shift_type == "day").count(), 2);
        assert_eq!(slots.iter().filter(|s| s.shift_type == "late").count(), 3);
    }

    #[test]
    fn midnight_crossing_ends_next_day() {
        let mut s = shift("night", 1);
        s.start_time = NaiveTime::from_hms_opt(22, 0, 0).unwrap();
        s.end_time = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        s.crosses_midnight = true;
        let t = template(vec![s]);

        let slots =
            expand_slots(&t, date(2025, 6, 2), date(2025, 6, 2), &RosterSnapshot::default())
                .unwrap();
        assert_eq!(slots.len(), 1);
        assert!(slots[0].ends_at > slots[0].starts_at);
        assert_eq!(
            (slots[0].ends_at - slots[0].starts_at).num_hours(),
            8,
            "22:00-06:00 is an 8 hour window"
        );
    }

    #[test]
    fn timezone_offset_applied() {
        let mut t = template(vec![shift("day", 1)]);
        t.timezone = chrono_tz::Europe::Berlin;
        let slots =
            expand_slots(&t, date(2025, 6, 2), date(2025, 6, 2), &RosterSnapshot::default())
                .unwrap();
        // Berlin is UTC+2 in June: 08:00 local == 06:00 UTC.
        assert_eq!(slots[0].starts_at.time(), NaiveTime::from_hms_opt(6, 0, 0).unwrap());
    }

    #[test]
    fn template_required_tags_merged_into_slots() {
        let mut s = shift("day", 1);
        s.required_tags = vec!["icu".into()];
        let mut t = template(vec![s]);
        t.constraint_rules.required_tags = vec!["nurse".into(), "icu".into()];

        let slots =
            expand_slots(&t, date(2025, 6, 2), date(2025, 6, 2), &RosterSnapshot::default())
                .unwrap();
        assert_eq!(slots[0].required_tags, vec!["nurse".to_string(), "icu".to_string()]);
    }

    #[test]
    fn inverted_range_rejected() {
        let t = template(vec![shift("day", 1)]);
        let err = expand_slots(&t, date(2025, 6, 4), date(2025, 6, 2), &RosterSnapshot::default());
        assert!(err.is_err());
    }

    #[test]
    fn oversized_range_rejected() {
        let t = template(vec![shift("day", 1)]);
        let err = expand_slots(&t, date(2025, 1, 1), date(2027, 1, 1), &RosterSnapshot::default());
        assert!(err.is_err());
    }

    #[test]
    fn expansion_is_deterministic() {
        let t = template(vec![shift("day", 2), shift("late", 1)]);
        let a = expand_slots(&t, date(2025, 6, 2), date(2025, 6, 8), &RosterSnapshot::default())
            .unwrap();
        let b = expand_slots(&t, date(2025, 6, 2), date(2025, 6, 8), &RosterSnapshot::default())
            .unwrap();
        assert_eq!(a, b);
    }
}
