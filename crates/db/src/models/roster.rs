//! Roster read models: employees, leave windows, holidays.
//!
//! These rows are inputs to generation only. They convert into the domain
//! snapshot types; the engine never sees database rows.

use serde::{Deserialize, Serialize};
use shiftgrid_core::roster::{Employee, LeaveWindow};
use shiftgrid_core::types::{DbId, Timestamp};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Employees
// ---------------------------------------------------------------------------

/// A row from the `employees` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EmployeeRow {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub tags: Vec<String>,
    pub active_from: chrono::NaiveDate,
    pub active_until: Option<chrono::NaiveDate>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EmployeeRow {
    pub fn into_domain(self) -> Employee {
        Employee {
            id: self.id,
            name: self.name,
            tags: self.tags,
            active_from: self.active_from,
            active_until: self.active_until,
        }
    }
}

/// DTO for creating an employee.
#[derive(Debug, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub active_from: chrono::NaiveDate,
    pub active_until: Option<chrono::NaiveDate>,
}

// ---------------------------------------------------------------------------
// Leave windows
// ---------------------------------------------------------------------------

/// A row from the `employee_leaves` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LeaveRow {
    pub id: DbId,
    pub tenant_id: DbId,
    pub employee_id: DbId,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub created_at: Timestamp,
}

impl LeaveRow {
    pub fn into_domain(self) -> LeaveWindow {
        LeaveWindow {
            employee_id: self.employee_id,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Holidays
// ---------------------------------------------------------------------------

/// A row from the `holidays` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HolidayRow {
    pub id: DbId,
    pub tenant_id: DbId,
    pub day: chrono::NaiveDate,
    pub name: String,
}
