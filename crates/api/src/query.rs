//! Shared query parameter types for API handlers.

use chrono::NaiveDate;
use serde::Deserialize;
use shiftgrid_core::types::DbId;

/// Query parameters for `GET /schedules`.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleListParams {
    pub template_id: Option<DbId>,
    /// Keep schedules whose range ends on or after this date.
    pub from: Option<NaiveDate>,
    /// Keep schedules whose range starts on or before this date.
    pub to: Option<NaiveDate>,
}
