//! Coverage template rule model.
//!
//! A template is the typed representation of "which headcounts are needed,
//! on which days, for which shift windows, under which rules". Rule payloads
//! arrive as JSON but are deserialized into the tagged structs below and
//! validated once, up front. Free-form maps never reach the engine.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum number of shift definitions in one coverage plan.
pub const MAX_COVERAGE_PLAN_LEN: usize = 200;

/// Maximum headcount per shift occurrence.
pub const MAX_HEADCOUNT: u32 = 500;

/// Maximum generation range, in days. Guards against runaway expansion.
pub const MAX_RANGE_DAYS: i64 = 366;

// ---------------------------------------------------------------------------
// Day pattern
// ---------------------------------------------------------------------------

/// Which calendar days a shift definition occurs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayPattern {
    /// Every day in the generation range.
    Daily,
    /// Only the listed weekdays.
    Weekly { days: Vec<Weekday> },
    /// Only the listed explicit dates.
    Dates { dates: Vec<NaiveDate> },
}

impl DayPattern {
    /// Whether this pattern produces an occurrence on `date`.
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            DayPattern::Daily => true,
            DayPattern::Weekly { days } => days.contains(&date.weekday()),
            DayPattern::Dates { dates } => dates.contains(&date),
        }
    }
}

// ---------------------------------------------------------------------------
// Shift definition
// ---------------------------------------------------------------------------

/// One recurring shift in a coverage plan.
///
/// Expands into `headcount` slots per matching date. Times are wall-clock
/// in the template's timezone; a window that ends on the next calendar day
/// must set `crosses_midnight` explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftDefinition {
    /// Shift-type tag, e.g. `"day"`, `"night"`, `"triage"`.
    pub shift_type: String,
    pub day_pattern: DayPattern,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// The window ends on the following calendar day.
    #[serde(default)]
    pub crosses_midnight: bool,
    /// Number of distinct employees needed per occurrence.
    pub headcount: u32,
    /// Tags an employee must carry to be eligible (ANDed with the
    /// template-wide `ConstraintRules::required_tags`).
    #[serde(default)]
    pub required_tags: Vec<String>,
    /// Fallback fairness weight for this shift type (see weight precedence
    /// on [`PreferenceRules`]).
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Skip occurrences that fall on a tenant holiday.
    #[serde(default)]
    pub skip_on_holiday: bool,
}

fn default_weight() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Rest rules
// ---------------------------------------------------------------------------

/// Hard rest constraints applied per employee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RestRules {
    /// Minimum gap, in hours, between two assignments for one employee.
    pub min_rest_hours: f64,
    /// Maximum consecutive calendar days with at least one assignment.
    pub max_consecutive_days: u32,
}

impl Default for RestRules {
    fn default() -> Self {
        Self {
            min_rest_hours: 11.0,
            max_consecutive_days: 6,
        }
    }
}

// ---------------------------------------------------------------------------
// Hard constraint rules
// ---------------------------------------------------------------------------

/// Template-wide hard eligibility predicates.
///
/// Active employment, leave overlap, and assignment overlap are always
/// enforced; this struct carries the configurable part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintRules {
    /// Tags every candidate must carry regardless of shift definition,
    /// e.g. a mandatory certification.
    #[serde(default)]
    pub required_tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// Soft preference rules
// ---------------------------------------------------------------------------

/// A per-employee soft bias for one shift type. Values below 1.0 make the
/// employee win ties for that shift type; values above 1.0 steer away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeBias {
    pub employee_id: DbId,
    pub shift_type: String,
    pub bias: f64,
}

/// Soft preference weights. Never override the hard gates.
///
/// Weight precedence per shift-type tag: run-level override map, then
/// `shift_type_weights` here, then the shift definition's own `weight`,
/// then 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRules {
    #[serde(default)]
    pub shift_type_weights: HashMap<String, f64>,
    #[serde(default)]
    pub employee_biases: Vec<EmployeeBias>,
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A tenant's coverage template, fully typed and validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterTemplate {
    pub name: String,
    /// IANA timezone the wall-clock shift times are expressed in.
    pub timezone: Tz,
    pub coverage_plan: Vec<ShiftDefinition>,
    #[serde(default)]
    pub rest_rules: RestRules,
    #[serde(default)]
    pub constraint_rules: ConstraintRules,
    #[serde(default)]
    pub preference_rules: PreferenceRules,
}

impl RosterTemplate {
    /// Validate template invariants. Called before any slot expansion;
    /// a template that fails here is rejected outright.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation(
                "Template name must not be empty".into(),
            ));
        }
        if self.coverage_plan.is_empty() {
            return Err(CoreError::Validation(
                "Coverage plan must contain at least one shift definition".into(),
            ));
        }
        if self.coverage_plan.len() > MAX_COVERAGE_PLAN_LEN {
            return Err(CoreError::Validation(format!(
                "Coverage plan must not exceed {MAX_COVERAGE_PLAN_LEN} shift definitions"
            )));
        }

        for (i, shift) in self.coverage_plan.iter().enumerate() {
            if shift.shift_type.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "Shift definition {i}: shift_type must not be empty"
                )));
            }
            if shift.headcount == 0 {
                return Err(CoreError::Validation(format!(
                    "Shift definition {i} ({}): headcount must be at least 1",
                    shift.shift_type
                )));
            }
            if shift.headcount > MAX_HEADCOUNT {
                return Err(CoreError::Validation(format!(
                    "Shift definition {i} ({}): headcount must not exceed {MAX_HEADCOUNT}",
                    shift.shift_type
                )));
            }
            if !shift.crosses_midnight && shift.end_time <= shift.start_time {
                return Err(CoreError::Validation(format!(
                    "Shift definition {i} ({}): end time must be after start time \
                     (set crosses_midnight for overnight shifts)",
                    shift.shift_type
                )));
            }
            if shift.crosses_midnight && shift.end_time >= shift.start_time {
                return Err(CoreError::Validation(format!(
                    "Shift definition {i} ({}): a midnight-crossing window must end \
                     before it starts on the clock",
                    shift.shift_type
                )));
            }
            if !(shift.weight.is_finite() && shift.weight > 0.0) {
                return Err(CoreError::Validation(format!(
                    "Shift definition {i} ({}): weight must be a positive number",
                    shift.shift_type
                )));
            }
            if let DayPattern::Weekly { days } = &shift.day_pattern {
                if days.is_empty() {
                    return Err(CoreError::Validation(format!(
                        "Shift definition {i} ({}): weekly pattern needs at least one day",
                        shift.shift_type
                    )));
                }
            }
        }

        if !(self.rest_rules.min_rest_hours.is_finite() && self.rest_rules.min_rest_hours >= 0.0) {
            return Err(CoreError::Validation(
                "min_rest_hours must be a non-negative number".into(),
            ));
        }
        if self.rest_rules.max_consecutive_days == 0 {
            return Err(CoreError::Validation(
                "max_consecutive_days must be at least 1".into(),
            ));
        }

        for (tag, weight) in &self.preference_rules.shift_type_weights {
            if !(weight.is_finite() && *weight > 0.0) {
                return Err(CoreError::Validation(format!(
                    "Preference weight for '{tag}' must be a positive number"
                )));
            }
        }
        for bias in &self.preference_rules.employee_biases {
            if !(bias.bias.is_finite() && bias.bias > 0.0) {
                return Err(CoreError::Validation(format!(
                    "Employee bias for employee {} / '{}' must be a positive number",
                    bias.employee_id, bias.shift_type
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
