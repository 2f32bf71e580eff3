//! Scheduler run models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shiftgrid_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// Lifecycle status of a scheduler run. Terminal states are never mutated;
/// regeneration always creates a new run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A row from the `scheduler_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SchedulerRun {
    pub id: DbId,
    pub tenant_id: DbId,
    pub template_id: DbId,
    pub source_schedule_id: Option<DbId>,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub seed: i64,
    pub options: serde_json::Value,
    pub requested_by: Option<String>,
    pub status: String,
    pub telemetry: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

/// DTO for recording a new run at invocation time.
#[derive(Debug)]
pub struct NewSchedulerRun {
    pub template_id: DbId,
    pub source_schedule_id: Option<DbId>,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub seed: i64,
    /// The full run options payload, kept for auditability.
    pub options: serde_json::Value,
    pub requested_by: Option<String>,
}
