//! Roster read models.
//!
//! The engine never talks to the database: the API layer fetches the
//! tenant's employees, approved leave, and holiday calendar once per run
//! and hands them in as a [`RosterSnapshot`]. This keeps the assignment
//! loop deterministic and testable in isolation.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// An employee as the engine sees them: identity, skill tags, and the
/// window in which they are actively employed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: DbId,
    pub name: String,
    /// Role/skill/certification tags, matched against shift requirements.
    pub tags: Vec<String>,
    pub active_from: NaiveDate,
    /// `None` means no scheduled end of employment.
    pub active_until: Option<NaiveDate>,
}

impl Employee {
    /// Whether the employee is actively employed on `date`.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        date >= self.active_from && self.active_until.map_or(true, |until| date <= until)
    }

    /// Whether the employee carries every tag in `required`.
    pub fn has_tags(&self, required: &[String]) -> bool {
        required.iter().all(|req| self.tags.iter().any(|t| t == req))
    }
}

/// One approved leave/absence window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveWindow {
    pub employee_id: DbId,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
}

impl LeaveWindow {
    /// Half-open overlap check against `[starts_at, ends_at)`.
    pub fn overlaps(&self, starts_at: Timestamp, ends_at: Timestamp) -> bool {
        self.starts_at < ends_at && starts_at < self.ends_at
    }
}

/// Everything the engine needs to know about a tenant's workforce for one
/// run, fetched up front.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    pub employees: Vec<Employee>,
    pub leaves: Vec<LeaveWindow>,
    pub holidays: BTreeSet<NaiveDate>,
}

impl RosterSnapshot {
    /// Whether `employee_id` has an approved leave overlapping the window.
    pub fn on_leave_during(
        &self,
        employee_id: DbId,
        starts_at: Timestamp,
        ends_at: Timestamp,
    ) -> bool {
        self.leaves
            .iter()
            .any(|l| l.employee_id == employee_id && l.overlaps(starts_at, ends_at))
    }

    /// Whether `date` is a tenant holiday.
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
