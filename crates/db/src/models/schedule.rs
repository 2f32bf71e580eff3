//! Schedule and slot models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shiftgrid_core::engine::PriorSlot;
use shiftgrid_core::types::{DbId, Timestamp};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

/// A row from the `schedules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Schedule {
    pub id: DbId,
    pub tenant_id: DbId,
    pub template_id: DbId,
    pub run_id: DbId,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// A row from the `schedule_slots` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScheduleSlot {
    pub id: DbId,
    pub tenant_id: DbId,
    pub schedule_id: DbId,
    pub position: i64,
    pub slot_date: NaiveDate,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub shift_type: String,
    pub required_tags: Vec<String>,
    pub employee_id: Option<DbId>,
    pub source: String,
    pub status: String,
    pub conflict_reason: Option<String>,
    pub manual_lock: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ScheduleSlot {
    /// View of this slot as regeneration input.
    pub fn to_prior(&self) -> PriorSlot {
        PriorSlot {
            date: self.slot_date,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            shift_type: self.shift_type.clone(),
            employee_id: self.employee_id,
            manual_lock: self.manual_lock,
        }
    }
}

/// DTO for a manual slot edit. `clear_employee` and `employee_id` are
/// mutually exclusive; the handler rejects payloads setting both.
#[derive(Debug, Deserialize)]
pub struct UpdateSlot {
    pub employee_id: Option<DbId>,
    #[serde(default)]
    pub clear_employee: bool,
    pub manual_lock: Option<bool>,
}

/// Optional filters for schedule listing.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleFilter {
    pub template_id: Option<DbId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
