//! Repository for scheduler runs and atomic result persistence.

use chrono::NaiveDate;
use sqlx::PgPool;

use shiftgrid_core::engine::ResolvedSlot;
use shiftgrid_core::types::DbId;

use crate::models::run::{NewSchedulerRun, RunStatus, SchedulerRun};
use crate::models::schedule::{Schedule, ScheduleSlot};

// ===========================================================================
// RunRepo
// ===========================================================================

const RUN_COLUMNS: &str = "\
    id, tenant_id, template_id, source_schedule_id, range_start, range_end, \
    seed, options, requested_by, status, telemetry, error, created_at, finished_at";

const SCHEDULE_COLUMNS: &str = "\
    id, tenant_id, template_id, run_id, range_start, range_end, created_at";

const SLOT_COLUMNS: &str = "\
    id, tenant_id, schedule_id, position, slot_date, starts_at, ends_at, \
    shift_type, required_tags, employee_id, source, status, conflict_reason, \
    manual_lock, created_at, updated_at";

/// Everything needed to persist one completed run atomically.
#[derive(Debug)]
pub struct CompletedRun<'a> {
    pub run_id: DbId,
    pub tenant_id: DbId,
    pub template_id: DbId,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub telemetry: &'a serde_json::Value,
    pub slots: &'a [ResolvedSlot],
}

/// Lifecycle and persistence for the `scheduler_runs` table.
pub struct RunRepo;

impl RunRepo {
    /// Record a new run in `running` state at invocation time.
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        input: &NewSchedulerRun,
    ) -> Result<SchedulerRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO scheduler_runs \
             (tenant_id, template_id, source_schedule_id, range_start, range_end, \
              seed, options, requested_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {RUN_COLUMNS}"
        );
        sqlx::query_as::<_, SchedulerRun>(&query)
            .bind(tenant_id)
            .bind(input.template_id)
            .bind(input.source_schedule_id)
            .bind(input.range_start)
            .bind(input.range_end)
            .bind(input.seed)
            .bind(&input.options)
            .bind(&input.requested_by)
            .fetch_one(pool)
            .await
    }

    /// List a tenant's runs, newest first.
    pub async fn list(pool: &PgPool, tenant_id: DbId) -> Result<Vec<SchedulerRun>, sqlx::Error> {
        let query =
            format!("SELECT {RUN_COLUMNS} FROM scheduler_runs WHERE tenant_id = $1 ORDER BY id DESC");
        sqlx::query_as::<_, SchedulerRun>(&query)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }

    /// Find a run by ID within a tenant.
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<SchedulerRun>, sqlx::Error> {
        let query =
            format!("SELECT {RUN_COLUMNS} FROM scheduler_runs WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, SchedulerRun>(&query)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Persist a completed run: schedule row, all slot rows, telemetry, and
    /// the status flip happen in one transaction. A failed write leaves
    /// nothing visible.
    pub async fn persist_completed(
        pool: &PgPool,
        input: &CompletedRun<'_>,
    ) -> Result<(Schedule, Vec<ScheduleSlot>), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let schedule_query = format!(
            "INSERT INTO schedules (tenant_id, template_id, run_id, range_start, range_end) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {SCHEDULE_COLUMNS}"
        );
        let schedule = sqlx::query_as::<_, Schedule>(&schedule_query)
            .bind(input.tenant_id)
            .bind(input.template_id)
            .bind(input.run_id)
            .bind(input.range_start)
            .bind(input.range_end)
            .fetch_one(&mut *tx)
            .await?;

        let slot_query = format!(
            "INSERT INTO schedule_slots \
             (tenant_id, schedule_id, position, slot_date, starts_at, ends_at, shift_type, \
              required_tags, employee_id, source, status, conflict_reason, manual_lock) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {SLOT_COLUMNS}"
        );
        let mut slots = Vec::with_capacity(input.slots.len());
        for slot in input.slots {
            let row = sqlx::query_as::<_, ScheduleSlot>(&slot_query)
                .bind(input.tenant_id)
                .bind(schedule.id)
                .bind(slot.draft.position as i64)
                .bind(slot.draft.date)
                .bind(slot.draft.starts_at)
                .bind(slot.draft.ends_at)
                .bind(&slot.draft.shift_type)
                .bind(&slot.draft.required_tags)
                .bind(slot.employee_id)
                .bind(slot.source.as_str())
                .bind(slot.status.as_str())
                .bind(slot.conflict_reason.map(|r| r.code()))
                .bind(slot.manual_lock)
                .fetch_one(&mut *tx)
                .await?;
            slots.push(row);
        }

        sqlx::query(
            "UPDATE scheduler_runs \
             SET status = $3, telemetry = $4, finished_at = now() \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(input.tenant_id)
        .bind(input.run_id)
        .bind(RunStatus::Completed.as_str())
        .bind(input.telemetry)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            tenant_id = input.tenant_id,
            run_id = input.run_id,
            schedule_id = schedule.id,
            slots = slots.len(),
            "Persisted completed run",
        );
        Ok((schedule, slots))
    }

    /// Mark a run failed with an error message.
    pub async fn mark_failed(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE scheduler_runs \
             SET status = $3, error = $4, finished_at = now() \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(RunStatus::Failed.as_str())
        .bind(error)
        .execute(pool)
        .await
        .map(|_| ())
    }
}
